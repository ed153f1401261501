//! Draw the TMCs and ATRs on an interactive (Leaflet) map.
use std::fs;
use std::path::Path;

use log::info;
use rinja::Template;

use crate::normalize::AtrRecord;
use crate::tables::TmcRecord;
use crate::TmcError;

/// Downtown Boston.
const CENTER: Marker = Marker {
    latitude: 42.3601,
    longitude: -71.0589,
};
const ZOOM: u8 = 12;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Marker {
    pub latitude: f64,
    pub longitude: f64,
}

impl From<(f64, f64)> for Marker {
    fn from((latitude, longitude): (f64, f64)) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

#[derive(Template, Debug)]
#[template(path = "map.html")]
struct MapTemplate<'a> {
    title: &'a str,
    center: Marker,
    zoom: u8,
    tmcs: Vec<Marker>,
    atrs: Vec<Marker>,
}

/// Render the map as a standalone HTML page. Anything without coordinates is left off.
pub fn render_map(tmcs: &[TmcRecord], atrs: &[AtrRecord]) -> Result<String, TmcError> {
    let template = MapTemplate {
        title: "TMCs and ATRs",
        center: CENTER,
        zoom: ZOOM,
        tmcs: tmcs
            .iter()
            .filter_map(TmcRecord::coordinates)
            .map(Marker::from)
            .collect(),
        atrs: atrs
            .iter()
            .filter_map(AtrRecord::coordinates)
            .map(Marker::from)
            .collect(),
    };
    Ok(template.render()?)
}

/// Render the map and write it to `path`.
pub fn write_map(path: &Path, tmcs: &[TmcRecord], atrs: &[AtrRecord]) -> Result<(), TmcError> {
    let html = render_map(tmcs, atrs)?;
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::write(path, html)?;
    info!("Map written to {path:?}");
    Ok(())
}

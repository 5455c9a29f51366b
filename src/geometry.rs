//! Spatial extent of a retrieval. The same value filters the catalog search
//! and drives the clip/reproject step, so both stay spatially consistent.
use std::fmt;
use std::str::FromStr;

use geo::{coord, Point, Rect};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub const WGS84: u32 = 4326;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Geometry {
    Point { point: Point<f64>, crs: u32 },
    #[serde(rename = "bbox")]
    BBox { rect: Rect<f64>, crs: u32 },
}

impl Geometry {
    pub fn point(x: f64, y: f64, crs: u32) -> Self {
        Self::Point {
            point: Point::new(x, y),
            crs,
        }
    }

    pub fn bbox(xmin: f64, ymin: f64, xmax: f64, ymax: f64, crs: u32) -> Self {
        Self::BBox {
            rect: Rect::new(coord! { x: xmin, y: ymin }, coord! { x: xmax, y: ymax }),
            crs,
        }
    }

    /// EPSG code of the coordinates.
    pub fn crs(&self) -> u32 {
        match self {
            Self::Point { crs, .. } | Self::BBox { crs, .. } => *crs,
        }
    }

    /// `[xmin, ymin, xmax, ymax]`; a point collapses to a zero-area box.
    pub fn bounds(&self) -> [f64; 4] {
        match self {
            Self::Point { point, .. } => [point.x(), point.y(), point.x(), point.y()],
            Self::BBox { rect, .. } => [rect.min().x, rect.min().y, rect.max().x, rect.max().y],
        }
    }

    /// Bounds in longitude/latitude, or an error when the geometry is in a
    /// projected CRS that a catalog query cannot use directly.
    pub fn lon_lat_bounds(&self) -> anyhow::Result<[f64; 4]> {
        if self.crs() != WGS84 {
            anyhow::bail!(
                "Catalog queries need EPSG:{} coordinates, got EPSG:{}",
                WGS84,
                self.crs()
            );
        }
        Ok(self.bounds())
    }
}

impl fmt::Display for Geometry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Point { point, crs } => {
                write!(f, "POINT ({} {}) EPSG:{}", point.x(), point.y(), crs)
            }
            Self::BBox { rect, crs } => write!(
                f,
                "BBOX ({} {}, {} {}) EPSG:{}",
                rect.min().x,
                rect.min().y,
                rect.max().x,
                rect.max().y,
                crs
            ),
        }
    }
}

/// Parses `lon,lat` or `xmin,ymin,xmax,ymax`, optionally followed by
/// `@EPSG:<code>`. Without a suffix the coordinates are taken as EPSG:4326.
impl FromStr for Geometry {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::InvalidGeometry(s.to_string());

        let (coords, crs) = match s.split_once('@') {
            Some((coords, crs)) => {
                let crs = crs.trim();
                let code = crs
                    .strip_prefix("EPSG:")
                    .or_else(|| crs.strip_prefix("epsg:"))
                    .unwrap_or(crs);
                (coords, code.parse::<u32>().map_err(|_| invalid())?)
            }
            None => (s, WGS84),
        };

        let values = coords
            .split(',')
            .map(|v| v.trim().parse::<f64>())
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|_| invalid())?;

        match values.as_slice() {
            [x, y] => Ok(Self::point(*x, *y, crs)),
            [xmin, ymin, xmax, ymax] => Ok(Self::bbox(*xmin, *ymin, *xmax, *ymax, crs)),
            _ => Err(invalid()),
        }
    }
}

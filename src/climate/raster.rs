//! In-memory Köppen raster and GeoTIFF loading

use reqwest::Client;
use std::io::Cursor;
use std::sync::Arc;
use tiff::decoder::{Decoder, DecodingResult, Limits};
use tiff::tags::Tag;
use tracing::{info, instrument, warn};

use crate::models::Coordinate;
use crate::{Result, SkyAtlasError};

/// Georeferencing of a north-up raster
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridGeometry {
    /// Longitude of the west edge
    pub origin_lon: f64,
    /// Latitude of the north edge
    pub origin_lat: f64,
    /// Cell width in degrees
    pub cell_width: f64,
    /// Cell height in degrees; only the magnitude is used
    pub cell_height: f64,
    /// Column count
    pub width: usize,
    /// Row count
    pub height: usize,
}

impl GridGeometry {
    /// Whole-globe extent for a raster with the given pixel size
    #[must_use]
    pub fn global(width: usize, height: usize) -> Self {
        Self {
            origin_lon: -180.0,
            origin_lat: 90.0,
            cell_width: 360.0 / width.max(1) as f64,
            cell_height: 180.0 / height.max(1) as f64,
            width,
            height,
        }
    }

    /// `(row, column)` of the cell containing `coordinate`, if inside the grid
    #[must_use]
    pub fn cell_of(&self, coordinate: Coordinate) -> Option<(usize, usize)> {
        let col = ((coordinate.lon - self.origin_lon) / self.cell_width).floor();
        let row = ((self.origin_lat - coordinate.lat) / self.cell_height.abs()).floor();

        // NaN fails both comparisons
        if !(col >= 0.0 && row >= 0.0) {
            return None;
        }
        if col >= self.width as f64 || row >= self.height as f64 {
            return None;
        }
        Some((row as usize, col as usize))
    }
}

/// Immutable grid of integer climate codes, row 0 northernmost
#[derive(Debug, Clone)]
pub struct RasterGrid {
    geometry: GridGeometry,
    codes: Vec<i32>,
    nodata: Option<i32>,
}

impl RasterGrid {
    /// Build a grid from row-major codes
    pub fn new(geometry: GridGeometry, codes: Vec<i32>) -> Result<Self> {
        if geometry.width == 0 || geometry.height == 0 {
            return Err(SkyAtlasError::raster("raster has no cells"));
        }
        let cells_valid = [geometry.cell_width, geometry.cell_height]
            .iter()
            .all(|c| c.is_finite() && *c != 0.0);
        if !cells_valid || geometry.cell_width < 0.0 {
            return Err(SkyAtlasError::raster(format!(
                "invalid cell size {} x {}",
                geometry.cell_width, geometry.cell_height
            )));
        }
        let expected = geometry.width * geometry.height;
        if codes.len() != expected {
            return Err(SkyAtlasError::raster(format!(
                "expected {expected} cells ({} x {}), got {}",
                geometry.width,
                geometry.height,
                codes.len()
            )));
        }
        Ok(Self {
            geometry,
            codes,
            nodata: None,
        })
    }

    /// Treat `value` as "no data"
    #[must_use]
    pub fn with_nodata(mut self, value: Option<i32>) -> Self {
        self.nodata = value;
        self
    }

    #[must_use]
    pub fn geometry(&self) -> &GridGeometry {
        &self.geometry
    }

    #[must_use]
    pub fn nodata(&self) -> Option<i32> {
        self.nodata
    }

    /// Stored value at `(row, col)`; `None` outside the grid or on no-data
    #[must_use]
    pub fn value_at(&self, row: usize, col: usize) -> Option<i32> {
        if row >= self.geometry.height || col >= self.geometry.width {
            return None;
        }
        let value = *self.codes.get(row * self.geometry.width + col)?;
        (Some(value) != self.nodata).then_some(value)
    }

    /// Code of the cell containing `coordinate`
    #[must_use]
    pub fn lookup(&self, coordinate: Coordinate) -> Option<i32> {
        let (row, col) = self.geometry.cell_of(coordinate)?;
        self.value_at(row, col)
    }

    /// Decode a single-band integer GeoTIFF.
    ///
    /// Georeferencing comes from ModelPixelScale + ModelTiepoint; without
    /// them the raster is assumed to cover the whole globe.
    pub fn from_geotiff(bytes: &[u8]) -> Result<Self> {
        let mut decoder = Decoder::new(Cursor::new(bytes))?.with_limits(Limits::unlimited());
        let (width, height) = decoder.dimensions()?;
        let (width, height) = (width as usize, height as usize);

        let scale = decoder
            .find_tag(Tag::ModelPixelScaleTag)?
            .map(|v| v.into_f64_vec())
            .transpose()?;
        let tiepoint = decoder
            .find_tag(Tag::ModelTiepointTag)?
            .map(|v| v.into_f64_vec())
            .transpose()?;
        let nodata = decoder
            .find_tag(Tag::GdalNodata)?
            .map(|v| v.into_string())
            .transpose()?
            .and_then(|s| parse_nodata(&s));

        let geometry = match (scale.as_deref(), tiepoint.as_deref()) {
            (Some([sx, sy, ..]), Some([i, j, _, x, y, ..])) => GridGeometry {
                origin_lon: x - i * sx,
                origin_lat: y + j * sy,
                cell_width: *sx,
                cell_height: *sy,
                width,
                height,
            },
            _ => GridGeometry::global(width, height),
        };

        let codes = match decoder.read_image()? {
            DecodingResult::U8(v) => v.into_iter().map(i32::from).collect(),
            DecodingResult::I8(v) => v.into_iter().map(i32::from).collect(),
            DecodingResult::U16(v) => v.into_iter().map(i32::from).collect(),
            DecodingResult::I16(v) => v.into_iter().map(i32::from).collect(),
            DecodingResult::I32(v) => v,
            DecodingResult::U32(v) => v
                .into_iter()
                .map(|c| i32::try_from(c).unwrap_or(i32::MAX))
                .collect(),
            _ => {
                return Err(SkyAtlasError::raster(
                    "unsupported sample format; expected integer codes",
                ));
            }
        };

        Ok(Self::new(geometry, codes)?.with_nodata(nodata))
    }
}

fn parse_nodata(raw: &str) -> Option<i32> {
    let value: f64 = raw.trim().trim_end_matches('\0').parse().ok()?;
    (value.fract() == 0.0 && value >= f64::from(i32::MIN) && value <= f64::from(i32::MAX))
        .then_some(value as i32)
}

/// Fetch or read the raster bytes from a path or http(s) URL
async fn read_source(source: &str, client: &Client) -> Result<Vec<u8>> {
    if source.starts_with("http://") || source.starts_with("https://") {
        let response = client.get(source).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SkyAtlasError::api_status(
                status.as_u16(),
                format!("raster download returned {status}"),
            ));
        }
        Ok(response.bytes().await?.to_vec())
    } else {
        Ok(tokio::fs::read(source).await?)
    }
}

/// Load the raster once at startup. Every failure degrades to `None`.
#[instrument(skip(client))]
pub async fn load_raster(source: &str, client: &Client) -> Option<Arc<RasterGrid>> {
    let bytes = match read_source(source, client).await {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!("Climate raster unavailable: {}", e);
            return None;
        }
    };

    let decoded = tokio::task::spawn_blocking(move || RasterGrid::from_geotiff(&bytes)).await;
    match decoded {
        Ok(Ok(grid)) => {
            let g = grid.geometry();
            info!(
                "Loaded climate raster {}x{} (origin {}, {}; cell {} x {}; nodata {:?})",
                g.width,
                g.height,
                g.origin_lon,
                g.origin_lat,
                g.cell_width,
                g.cell_height,
                grid.nodata()
            );
            Some(Arc::new(grid))
        }
        Ok(Err(e)) => {
            warn!("Climate raster could not be decoded: {}", e);
            None
        }
        Err(e) => {
            warn!("Climate raster decode task failed: {}", e);
            None
        }
    }
}

//! Splitting a product's bounds into equator and meridian aligned requests.
//!
//! The composite raster spans the product's own west..east range
//! horizontally and the whole globe vertically: the top half holds the
//! northern hemisphere (pole at row 0), the bottom half the southern one
//! (equator at the first row of the half). Each quadrant request is
//! rendered into its own disjoint pixel rectangle.

use tracing::debug;

use wms_common::{Crs, GeoBounds, GeoCoordinate};

/// Which corner of the composite a request fills.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Quadrant {
    NorthWest,
    NorthEast,
    SouthWest,
    SouthEast,
}

impl Quadrant {
    pub fn is_north(&self) -> bool {
        matches!(self, Quadrant::NorthWest | Quadrant::NorthEast)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Quadrant::NorthWest => "nw",
            Quadrant::NorthEast => "ne",
            Quadrant::SouthWest => "sw",
            Quadrant::SouthEast => "se",
        }
    }
}

/// Pixel rectangle inside the composite raster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl PixelRect {
    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    pub fn contains(&self, x: u32, y: u32) -> bool {
        x >= self.x && x < self.x + self.width && y >= self.y && y < self.y + self.height
    }
}

/// One image fetch for one quadrant of a product.
#[derive(Debug, Clone, PartialEq)]
pub struct TileRequest {
    pub product_id: String,
    pub quadrant: Quadrant,

    /// Where the decoded tile lands in the composite
    pub dest: PixelRect,

    /// Area covered, in the product's reference system
    pub bounds: GeoBounds,

    /// Time parameter, absent for products without a time dimension
    pub time: Option<String>,
}

impl TileRequest {
    pub fn is_north(&self) -> bool {
        self.quadrant.is_north()
    }

    /// Requested image size, equal to the destination rectangle.
    pub fn size(&self) -> (u32, u32) {
        (self.dest.width, self.dest.height)
    }
}

/// Plans quadrant requests for a composite of a fixed pixel size.
#[derive(Debug, Clone, Copy)]
pub struct TileRequestPlanner {
    width: u32,
    height: u32,
}

impl TileRequestPlanner {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Emit zero to four requests covering `bounds`.
    pub fn plan(&self, product_id: &str, bounds: &GeoBounds, time: Option<&str>) -> Vec<TileRequest> {
        if !bounds.check(product_id) || !bounds.is_valid() {
            debug!(product = %product_id, "Bounds unusable, nothing to request");
            return Vec::new();
        }
        let crs = bounds.crs();

        let meridian = GeoCoordinate::new(0.0, 0.0, Crs::Crs84).convert(crs).lon();
        let west_lin = crs.to_linear_lon(bounds.west());
        let east_lin = crs.to_linear_lon(bounds.east());
        let meridian_lin = crs.to_linear_lon(meridian);

        let has_west = bounds.west() < meridian;
        let has_east = bounds.east() > meridian;
        let has_north = crs.to_linear_lat(bounds.north()) > 0.0;
        let has_south = crs.to_linear_lat(bounds.south()) < 0.0;

        let west_width = match (has_west, has_east) {
            (true, true) => {
                let fraction = (meridian_lin - west_lin) / (east_lin - west_lin);
                ((self.width as f64 * fraction).round() as u32).min(self.width)
            }
            (true, false) => self.width,
            _ => 0,
        };
        let east_width = self.width - west_width;
        let north_height = self.height / 2;
        let south_height = self.height - north_height;

        let mut columns = Vec::with_capacity(2);
        if has_west {
            columns.push((false, 0, west_width, bounds.west(), meridian));
        }
        if has_east {
            columns.push((true, west_width, east_width, meridian, bounds.east()));
        }
        let mut rows = Vec::with_capacity(2);
        if has_north {
            rows.push((true, 0, north_height, 0.0, bounds.north()));
        }
        if has_south {
            rows.push((false, north_height, south_height, bounds.south(), 0.0));
        }

        let mut requests = Vec::with_capacity(4);
        for &(north, y, height, south_edge, north_edge) in &rows {
            for &(east, x, width, west_edge, east_edge) in &columns {
                if width == 0 || height == 0 {
                    continue;
                }
                let quadrant = match (north, east) {
                    (true, false) => Quadrant::NorthWest,
                    (true, true) => Quadrant::NorthEast,
                    (false, false) => Quadrant::SouthWest,
                    (false, true) => Quadrant::SouthEast,
                };
                requests.push(TileRequest {
                    product_id: product_id.to_string(),
                    quadrant,
                    dest: PixelRect { x, y, width, height },
                    bounds: GeoBounds::from_edges(west_edge, south_edge, east_edge, north_edge, crs),
                    time: time.map(str::to_string),
                });
            }
        }
        debug!(product = %product_id, requests = requests.len(), "Planned tile requests");
        requests
    }
}

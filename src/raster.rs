//! GeoTIFF reading and writing.
//!
//! Only what the delineation needs is understood: a single band of integer or
//! float samples, the `ModelPixelScale`/`ModelTiepoint` (or
//! `ModelTransformation`) georeferencing, the GeoKey directory for the CRS,
//! and GDAL's no-data tag.
use std::fmt;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use ndarray::{s, Array2, ArrayView2};
use num::NumCast;
use tiff::decoder::{Decoder, DecodingResult};
use tiff::encoder::colortype::{self, ColorType};
use tiff::encoder::{TiffEncoder, TiffValue};
use tiff::tags::Tag;

use crate::error::{Error, Result};

const MODEL_PIXEL_SCALE: u16 = 33550;
const MODEL_TIEPOINT: u16 = 33922;
const MODEL_TRANSFORMATION: u16 = 34264;
const GEO_KEY_DIRECTORY: u16 = 34735;
const GEO_ASCII_PARAMS: u16 = 34737;
const GDAL_NODATA: u16 = 42113;

const PROJECTED_CS_TYPE_KEY: u16 = 3072;
const GEOGRAPHIC_TYPE_KEY: u16 = 2048;
const USER_DEFINED: u16 = 32767;

fn tag(code: u16) -> Tag {
    Tag::from_u16_exhaustive(code)
}

/// Sample types a raster can be read into or written from.
pub trait RasterValue: Copy + PartialEq + NumCast + fmt::Debug + Send + Sync + 'static {
    type Colortype: ColorType<Inner = Self>;
    const DEFAULT_NODATA: Self;
}

impl RasterValue for u8 {
    type Colortype = colortype::Gray8;
    const DEFAULT_NODATA: Self = u8::MAX;
}

impl RasterValue for u16 {
    type Colortype = colortype::Gray16;
    const DEFAULT_NODATA: Self = u16::MAX;
}

impl RasterValue for f32 {
    type Colortype = colortype::Gray32Float;
    const DEFAULT_NODATA: Self = -9999.0;
}

impl RasterValue for f64 {
    type Colortype = colortype::Gray64Float;
    const DEFAULT_NODATA: Self = -9999.0;
}

/// North-up affine transform, GDAL order `[x0, dx, 0, y0, 0, dy]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoTransform {
    pub x0: f64,
    pub dx: f64,
    pub y0: f64,
    pub dy: f64,
}

impl GeoTransform {
    pub fn new(x0: f64, dx: f64, y0: f64, dy: f64) -> Self {
        Self { x0, dx, y0, dy }
    }

    pub fn from_gdal(geo: [f64; 6]) -> Self {
        Self::new(geo[0], geo[1], geo[3], geo[5])
    }

    pub fn to_gdal(&self) -> [f64; 6] {
        [self.x0, self.dx, 0.0, self.y0, 0.0, self.dy]
    }

    /// Map coordinates of the upper-left corner of a cell.
    pub fn cell_corner(&self, row: usize, col: usize) -> (f64, f64) {
        (
            self.x0 + col as f64 * self.dx,
            self.y0 + row as f64 * self.dy,
        )
    }

    pub fn cell_center(&self, row: usize, col: usize) -> (f64, f64) {
        (
            self.x0 + (col as f64 + 0.5) * self.dx,
            self.y0 + (row as f64 + 0.5) * self.dy,
        )
    }

    /// `(row, col)` of the cell containing `(x, y)`; may be outside the grid.
    pub fn cell_of(&self, x: f64, y: f64) -> (isize, isize) {
        (
            ((y - self.y0) / self.dy).floor() as isize,
            ((x - self.x0) / self.dx).floor() as isize,
        )
    }

    pub fn cell_area(&self) -> f64 {
        (self.dx * self.dy).abs()
    }

    /// Extent covered by `rows` x `cols` cells from the origin.
    pub fn extent(&self, rows: usize, cols: usize) -> Extent {
        let (xa, ya) = self.cell_corner(0, 0);
        let (xb, yb) = self.cell_corner(rows, cols);
        Extent {
            xmin: xa.min(xb),
            xmax: xa.max(xb),
            ymin: ya.min(yb),
            ymax: ya.max(yb),
        }
    }

    /// Transform of the view starting at `window`'s upper-left cell.
    pub fn window(&self, window: &Window) -> Self {
        let (x0, y0) = self.cell_corner(window.row0, window.col0);
        Self::new(x0, self.dx, y0, self.dy)
    }
}

/// Plotting extent: left, right, bottom, top.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Extent {
    pub xmin: f64,
    pub xmax: f64,
    pub ymin: f64,
    pub ymax: f64,
}

/// A rectangular block of cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub row0: usize,
    pub col0: usize,
    pub rows: usize,
    pub cols: usize,
}

impl Window {
    /// The cells of `grid` inside the window.
    pub fn slice<'a, T>(&self, grid: &'a Array2<T>) -> ArrayView2<'a, T> {
        grid.slice(s![self.row0..self.row0 + self.rows, self.col0..self.col0 + self.cols])
    }
}

/// Coordinate reference system as recorded in the GeoKey directory.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Crs {
    pub epsg: Option<u16>,
    pub citation: Option<String>,
    pub geokeys: Vec<u16>,
}

impl Crs {
    /// A projected CRS with a minimal key directory
    /// (model type projected, raster type pixel-is-area).
    pub fn projected(epsg: u16) -> Self {
        Self {
            epsg: Some(epsg),
            citation: None,
            geokeys: vec![
                1, 1, 0, 3,
                1024, 0, 1, 1,
                1025, 0, 1, 1,
                PROJECTED_CS_TYPE_KEY, 0, 1, epsg,
            ],
        }
    }

    pub fn is_defined(&self) -> bool {
        self.epsg.is_some() || self.citation.is_some()
    }

    /// ESRI-style WKT for the EPSG code, when the code is a known one.
    pub fn wkt(&self) -> Option<&'static str> {
        self.epsg.and_then(crs_definitions::from_code).map(|def| def.wkt)
    }

    fn from_tags(geokeys: Vec<u16>, ascii: Option<String>) -> Self {
        let citation = ascii
            .map(|s| s.trim_end_matches(['|', '\0']).trim().to_string())
            .filter(|s| !s.is_empty());
        Self {
            epsg: epsg_from_geokeys(&geokeys),
            citation,
            geokeys,
        }
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.epsg, &self.citation) {
            (Some(code), Some(citation)) => write!(f, "EPSG:{code} ({citation})"),
            (Some(code), None) => write!(f, "EPSG:{code}"),
            (None, Some(citation)) => write!(f, "{citation}"),
            (None, None) => write!(f, "undefined"),
        }
    }
}

/// EPSG code of the projected (preferred) or geographic CRS, if the
/// directory names one.
fn epsg_from_geokeys(keys: &[u16]) -> Option<u16> {
    if keys.len() < 4 {
        return None;
    }
    let count = keys[3] as usize;
    let mut geographic = None;
    for entry in keys[4..].chunks_exact(4).take(count) {
        let (id, location, value) = (entry[0], entry[1], entry[3]);
        // location 0 means the value is stored inline
        if location != 0 || value == 0 || value == USER_DEFINED {
            continue;
        }
        match id {
            PROJECTED_CS_TYPE_KEY => return Some(value),
            GEOGRAPHIC_TYPE_KEY => geographic = Some(value),
            _ => {}
        }
    }
    geographic
}

/// A georeferenced grid.
#[derive(Debug, Clone, PartialEq)]
pub struct Raster<T> {
    pub data: Array2<T>,
    pub nodata: T,
    pub transform: GeoTransform,
    pub crs: Crs,
}

impl<T: Clone> Raster<T> {
    pub fn shape(&self) -> (usize, usize) {
        (self.data.nrows(), self.data.ncols())
    }

    pub fn extent(&self) -> Extent {
        let (rows, cols) = self.shape();
        self.transform.extent(rows, cols)
    }
}

impl Raster<f64> {
    /// `true` where the cell holds an elevation.
    pub fn valid_mask(&self) -> Array2<bool> {
        let nodata = self.nodata;
        self.data.mapv(|z| !z.is_nan() && z != nodata)
    }
}

fn cast_samples<S: NumCast + Copy, T: RasterValue>(buf: Vec<S>, nodata: T) -> Vec<T> {
    buf.into_iter().map(|v| num::cast(v).unwrap_or(nodata)).collect()
}

/// Reads a single-band GeoTIFF into a [`Raster`], casting samples to `T`.
///
/// Samples that cannot be represented as `T` become no-data. The file must be
/// georeferenced and carry a coordinate reference system.
///
/// # Example
///
/// ```no_run
/// use catchment_delineate::rasterfile_to_array;
///
/// let dem = rasterfile_to_array::<f64>("NY30sw_DTM_1m.tif".as_ref()).expect("readable DEM");
/// println!("{} rows, crs {}", dem.shape().0, dem.crs);
/// ```
pub fn rasterfile_to_array<T: RasterValue>(path: &Path) -> Result<Raster<T>> {
    let file = File::open(path)?;
    let mut decoder = Decoder::new(BufReader::new(file))?;
    let (width, height) = decoder.dimensions()?;
    let (rows, cols) = (height as usize, width as usize);

    let nodata: T = decoder
        .get_tag_ascii_string(tag(GDAL_NODATA))
        .ok()
        .and_then(|s| s.trim_matches(char::from(0)).trim().parse::<f64>().ok())
        .and_then(num::cast::<f64, T>)
        .unwrap_or(T::DEFAULT_NODATA);

    let samples: Vec<T> = match decoder.read_image()? {
        DecodingResult::U8(buf) => cast_samples(buf, nodata),
        DecodingResult::U16(buf) => cast_samples(buf, nodata),
        DecodingResult::U32(buf) => cast_samples(buf, nodata),
        DecodingResult::U64(buf) => cast_samples(buf, nodata),
        DecodingResult::I8(buf) => cast_samples(buf, nodata),
        DecodingResult::I16(buf) => cast_samples(buf, nodata),
        DecodingResult::I32(buf) => cast_samples(buf, nodata),
        DecodingResult::I64(buf) => cast_samples(buf, nodata),
        DecodingResult::F32(buf) => cast_samples(buf, nodata),
        DecodingResult::F64(buf) => cast_samples(buf, nodata),
        #[allow(unreachable_patterns)]
        _ => return Err(Error::UnsupportedSampleFormat { path: path.to_path_buf() }),
    };
    let got = samples.len();
    let data = Array2::from_shape_vec((rows, cols), samples)
        .map_err(|_| Error::SampleCount { got, rows, cols })?;

    let transform = read_transform(&mut decoder).ok_or_else(|| Error::MissingGeoTransform {
        path: path.to_path_buf(),
    })?;

    let geokeys = decoder.get_tag_u16_vec(tag(GEO_KEY_DIRECTORY)).unwrap_or_default();
    let ascii = decoder.get_tag_ascii_string(tag(GEO_ASCII_PARAMS)).ok();
    let crs = Crs::from_tags(geokeys, ascii);
    if !crs.is_defined() {
        return Err(Error::UndefinedCrs { path: path.to_path_buf() });
    }

    Ok(Raster { data, nodata, transform, crs })
}

fn read_transform<R: std::io::Read + std::io::Seek>(decoder: &mut Decoder<R>) -> Option<GeoTransform> {
    let scale = decoder.get_tag_f64_vec(tag(MODEL_PIXEL_SCALE)).ok();
    let tiepoint = decoder.get_tag_f64_vec(tag(MODEL_TIEPOINT)).ok();
    if let (Some(scale), Some(tie)) = (scale, tiepoint) {
        if scale.len() >= 2 && tie.len() >= 6 {
            // tiepoint is [I, J, K, X, Y, Z]
            return Some(GeoTransform::new(
                tie[3] - tie[0] * scale[0],
                scale[0],
                tie[4] + tie[1] * scale[1],
                -scale[1],
            ));
        }
    }
    let matrix = decoder.get_tag_f64_vec(tag(MODEL_TRANSFORMATION)).ok()?;
    if matrix.len() < 16 {
        return None;
    }
    Some(GeoTransform::new(matrix[3], matrix[0], matrix[7], matrix[5]))
}

/// Writes a [`Raster`] as a single-band GeoTIFF that [`rasterfile_to_array`]
/// reads back unchanged.
pub fn array_to_rasterfile<T: RasterValue>(raster: &Raster<T>, path: &Path) -> Result<()>
where
    [T]: TiffValue,
{
    let file = BufWriter::new(File::create(path)?);
    let mut encoder = TiffEncoder::new(file)?;
    let (rows, cols) = raster.shape();
    let mut image = encoder.new_image::<T::Colortype>(cols as u32, rows as u32)?;

    let t = &raster.transform;
    let scale = [t.dx, t.dy.abs(), 0.0];
    let tiepoint = [0.0, 0.0, 0.0, t.x0, t.y0, 0.0];
    image.encoder().write_tag(tag(MODEL_PIXEL_SCALE), &scale[..])?;
    image.encoder().write_tag(tag(MODEL_TIEPOINT), &tiepoint[..])?;
    if !raster.crs.geokeys.is_empty() {
        image
            .encoder()
            .write_tag(tag(GEO_KEY_DIRECTORY), &raster.crs.geokeys[..])?;
    }
    if let Some(citation) = &raster.crs.citation {
        image
            .encoder()
            .write_tag(tag(GEO_ASCII_PARAMS), format!("{citation}|").as_str())?;
    }
    if let Some(nodata) = num::cast::<T, f64>(raster.nodata) {
        image
            .encoder()
            .write_tag(tag(GDAL_NODATA), nodata.to_string().as_str())?;
    }

    let samples: Vec<T> = raster.data.iter().copied().collect();
    image.write_data(&samples)?;
    Ok(())
}

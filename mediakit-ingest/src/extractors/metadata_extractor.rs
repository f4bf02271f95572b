//! Image metadata extraction
//!
//! Stores every embedded tag under `image.<Directory>.<Name>`, picks the
//! canonical capture date, promotes GPS coordinates to `location`, records the
//! displayed dimensions and copies the XMP rating on first ingest.
//!
//! # Best-date selection
//! Candidate tags are ranked by their position in the configured priority
//! list. A candidate replaces the current best only when its rank is strictly
//! better, so the result does not depend on tag iteration order.

use chrono::{DateTime, Datelike, NaiveDateTime, Utc};
use tracing::{debug, warn};

use super::exif_reader::{file_tags, read_tags, RawTag, TagValue};
use crate::document::{AssetDocument, AttrValue, ImageSchema, LocationSchema, UserSchema};
use crate::error::ProcessorError;
use crate::proxy::Orientation;
use crate::types::{MediaKind, Processor};

/// Text values this long or longer are dropped
pub const MAX_TEXT_LEN: usize = 256;

/// Lists longer than this carry no useful description and are not stored
const MAX_LIST_LEN: usize = 16;

/// String date format used by EXIF and many other tag families
const TAG_DATE_FORMAT: &str = "%Y:%m:%d %H:%M:%S";

/// Candidate date tags, highest priority first
pub fn default_date_tags() -> Vec<String> {
    [
        "Exif.DateTimeOriginal",
        "Exif.DateTimeDigitized",
        "Exif.DateTime",
        "IPTC.DateCreated",
        "IPTC.TimeCreated",
        "File.FileModifiedDate",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// Tags whose text values become suggestable keywords
pub fn default_keyword_tags() -> Vec<String> {
    [
        "Exif.UserComment",
        "Exif.Make",
        "Exif.Model",
        "Exif.Artist",
        "IPTC.Keywords",
        "IPTC.CopyrightNotice",
        "IPTC.City",
        "IPTC.ProvinceState",
        "IPTC.CountryPrimaryLocationName",
        "Xmp.Lens",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// Strip everything but `[A-Za-z0-9]` from a tag name
pub fn normalize_tag_name(name: &str) -> String {
    name.chars().filter(|c| c.is_ascii_alphanumeric()).collect()
}

/// Parse a tag value as a date: native dates, or `yyyy:MM:dd HH:mm:ss` text
pub fn parse_tag_date(value: &TagValue) -> Option<DateTime<Utc>> {
    match value {
        TagValue::Date(d) => Some(*d),
        TagValue::Text(s) => NaiveDateTime::parse_from_str(s.trim(), TAG_DATE_FORMAT)
            .ok()
            .map(|naive| naive.and_utc()),
        _ => None,
    }
}

/// Year strictly after 1700 and no later than next year
pub fn is_sane_date(date: &DateTime<Utc>) -> bool {
    let year = date.year();
    year > 1700 && year <= Utc::now().year() + 1
}

/// Tracks the highest-priority qualifying date seen so far
#[derive(Debug)]
pub struct BestDateSelector<'a> {
    priorities: &'a [String],
    best: Option<(usize, DateTime<Utc>)>,
}

impl<'a> BestDateSelector<'a> {
    pub fn new(priorities: &'a [String]) -> Self {
        Self {
            priorities,
            best: None,
        }
    }

    /// Offer a candidate; returns true if it became the new best
    pub fn offer(&mut self, tag_id: &str, value: &TagValue) -> bool {
        let Some(rank) = self.priorities.iter().position(|p| p == tag_id) else {
            return false;
        };
        let Some(date) = parse_tag_date(value).filter(is_sane_date) else {
            return false;
        };
        match self.best {
            Some((best_rank, _)) if best_rank <= rank => false,
            _ => {
                self.best = Some((rank, date));
                true
            }
        }
    }

    pub fn best(&self) -> Option<DateTime<Utc>> {
        self.best.map(|(_, date)| date)
    }

    /// Tag id of the current best
    pub fn best_source(&self) -> Option<&str> {
        self.best
            .and_then(|(rank, _)| self.priorities.get(rank))
            .map(String::as_str)
    }
}

/// Convert degrees/minutes/seconds to signed decimal degrees
pub fn dms_to_degrees(degrees: f64, minutes: f64, seconds: f64, negative: bool) -> f64 {
    let decimal = degrees.signum() * (degrees.abs() + minutes / 60.0 + seconds / 3600.0);
    if negative {
        -decimal
    } else {
        decimal
    }
}

/// Convert a tag value to a storable attribute, `None` when it must be dropped
fn to_attr(value: &TagValue) -> Option<AttrValue> {
    match value {
        TagValue::Text(s) => {
            let s = s.trim();
            (s.chars().count() < MAX_TEXT_LEN).then(|| AttrValue::from(s))
        }
        TagValue::TextList(l) => Some(AttrValue::List(
            l.iter()
                .filter(|s| s.chars().count() < MAX_TEXT_LEN)
                .map(|s| AttrValue::from(s.trim()))
                .collect(),
        )),
        TagValue::Int(i) => Some(AttrValue::Int(*i)),
        TagValue::Float(f) | TagValue::Rational(f) => Some(AttrValue::float(*f)),
        TagValue::IntList(l) if l.len() <= MAX_LIST_LEN => {
            Some(AttrValue::List(l.iter().map(|i| AttrValue::Int(*i)).collect()))
        }
        TagValue::FloatList(l) | TagValue::RationalList(l) => Some(AttrValue::List(
            l.iter().map(|f| AttrValue::float(*f)).collect(),
        )),
        TagValue::Date(d) => Some(AttrValue::Date(*d)),
        TagValue::IntList(_) | TagValue::Bytes(_) => None,
    }
}

/// Descriptions are kept for numeric values only, and only when informative
fn keep_description(value: &TagValue, description: &str) -> bool {
    let numeric = match value {
        TagValue::Int(_) | TagValue::Float(_) | TagValue::Rational(_) => true,
        TagValue::IntList(l) => l.len() <= MAX_LIST_LEN,
        TagValue::FloatList(l) | TagValue::RationalList(l) => l.len() <= MAX_LIST_LEN,
        _ => false,
    };
    let description = description.trim();
    numeric
        && !description.is_empty()
        && description.chars().count() < MAX_TEXT_LEN
        && value.raw_text().as_deref() != Some(description)
}

fn keyword_texts(value: &TagValue) -> Vec<String> {
    match value {
        TagValue::Text(s) if s.chars().count() < MAX_TEXT_LEN => vec![s.clone()],
        TagValue::TextList(l) => l.clone(),
        _ => Vec::new(),
    }
}

/// Populates the `image`, `location` and `user` namespaces plus `source.date`
pub struct MetadataProcessor {
    date_tags: Vec<String>,
    keyword_tags: Vec<String>,
}

impl Default for MetadataProcessor {
    fn default() -> Self {
        Self::new(default_date_tags(), default_keyword_tags())
    }
}

impl MetadataProcessor {
    pub fn new(date_tags: Vec<String>, keyword_tags: Vec<String>) -> Self {
        Self {
            date_tags,
            keyword_tags,
        }
    }

    /// Store tags, keywords, canonical date and location
    ///
    /// Pure with respect to the filesystem; `process` feeds it tags read from
    /// the source file.
    pub fn apply_tags(
        &self,
        document: &mut AssetDocument,
        tags: &[RawTag],
    ) -> Result<(), ProcessorError> {
        let mut dates = BestDateSelector::new(&self.date_tags);

        for tag in tags {
            let name = normalize_tag_name(&tag.name);
            if name.is_empty() {
                continue;
            }
            let tag_id = format!("{}.{}", tag.directory, name);
            dates.offer(&tag_id, &tag.value);

            let Some(value) = to_attr(&tag.value) else {
                continue;
            };
            document.set_attr(&format!("image.{}", tag_id), value)?;

            if let Some(description) = &tag.description {
                if keep_description(&tag.value, description) {
                    document.set_attr(
                        &format!("image.{}_description", tag_id),
                        description.trim(),
                    )?;
                }
            }

            if self.keyword_tags.iter().any(|k| k == &tag_id) {
                document.add_keywords(1.0, true, keyword_texts(&tag.value));
            }
        }

        if let Some(date) = dates.best() {
            debug!(
                path = %document.path().display(),
                source = dates.best_source().unwrap_or_default(),
                date = %date,
                "Resolved capture date"
            );
            document.set_attr("source.date", date)?;
        }

        if let Some(location) = gps_location(document) {
            document.set_schema(location)?;
        }
        Ok(())
    }

    /// Record displayed dimensions, swapping for quarter-turn orientations
    pub fn apply_dimensions(
        &self,
        document: &mut AssetDocument,
        width: u32,
        height: u32,
    ) -> Result<(), ProcessorError> {
        let orientation = document
            .get_i64("image.Exif.Orientation")
            .map(Orientation::from_exif)
            .unwrap_or_default();
        let (width, height) = orientation.displayed(width, height);
        document.set_schema(ImageSchema {
            width: Some(width),
            height: Some(height),
        })?;
        Ok(())
    }

    /// Copy `image.Xmp.Rating` to `user.rating` on first ingest
    pub fn apply_rating(&self, document: &mut AssetDocument) -> Result<(), ProcessorError> {
        if document.is_update() {
            return Ok(());
        }
        if let Some(rating) = document.get_i64("image.Xmp.Rating") {
            document.set_schema(UserSchema {
                rating: Some(rating),
            })?;
        }
        Ok(())
    }
}

/// `location` from the GPS latitude/longitude triplets and their references
fn gps_location(document: &AssetDocument) -> Option<LocationSchema> {
    let triplet = |path: &str| -> Option<[f64; 3]> {
        let list = document.get_attr(path)?.as_list()?;
        match list {
            [d, m, s] => Some([d.as_f64()?, m.as_f64()?, s.as_f64()?]),
            _ => None,
        }
    };
    let lat = triplet("image.GPS.GPSLatitude")?;
    let lon = triplet("image.GPS.GPSLongitude")?;
    let south = document
        .get_str("image.GPS.GPSLatitudeRef")
        .is_some_and(|r| r.eq_ignore_ascii_case("S"));
    let west = document
        .get_str("image.GPS.GPSLongitudeRef")
        .is_some_and(|r| r.eq_ignore_ascii_case("W"));

    Some(LocationSchema {
        lat: dms_to_degrees(lat[0], lat[1], lat[2], south),
        lon: dms_to_degrees(lon[0], lon[1], lon[2], west),
    })
}

impl Processor for MetadataProcessor {
    fn name(&self) -> &str {
        "metadata"
    }

    fn supported_kinds(&self) -> &[MediaKind] {
        &[MediaKind::Image]
    }

    fn process(&self, document: &mut AssetDocument) -> Result<(), ProcessorError> {
        if document.attr_exists("image") && !document.is_changed() {
            debug!(path = %document.path().display(), "Image metadata already exists");
            return Ok(());
        }

        let path = document.path().to_path_buf();
        let mut tags = read_tags(&path).map_err(|e| {
            ProcessorError::unrecoverable(format!(
                "Unable to extract metadata from {}: {}",
                path.display(),
                e
            ))
        })?;
        tags.extend(file_tags(&path).map_err(|e| {
            ProcessorError::unrecoverable(format!("Unable to stat {}: {}", path.display(), e))
        })?);

        self.apply_tags(document, &tags)?;
        self.apply_rating(document)?;

        match image::image_dimensions(&path) {
            Ok((width, height)) => self.apply_dimensions(document, width, height),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Unable to determine image dimensions");
                Err(ProcessorError::soft(format!(
                    "Unable to determine image dimensions of {}: {}",
                    path.display(),
                    e
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn text(dir: &str, name: &str, value: &str) -> RawTag {
        RawTag::new(dir, name, TagValue::Text(value.to_string()))
    }

    #[test]
    fn test_normalize_tag_name() {
        assert_eq!(normalize_tag_name("Date/Time Original"), "DateTimeOriginal");
        assert_eq!(normalize_tag_name("Country-Primary Location"), "CountryPrimaryLocation");
        assert_eq!(normalize_tag_name("--"), "");
    }

    #[test]
    fn test_parse_tag_date_formats() {
        let expected = Utc.with_ymd_and_hms(2015, 7, 4, 18, 30, 5).unwrap();
        assert_eq!(
            parse_tag_date(&TagValue::Text("2015:07:04 18:30:05".to_string())),
            Some(expected)
        );
        assert_eq!(parse_tag_date(&TagValue::Date(expected)), Some(expected));
        assert_eq!(parse_tag_date(&TagValue::Text("yesterday".to_string())), None);
        assert_eq!(parse_tag_date(&TagValue::Int(2015)), None);
    }

    #[test]
    fn test_sane_date_bounds() {
        assert!(!is_sane_date(&Utc.with_ymd_and_hms(1700, 12, 31, 0, 0, 0).unwrap()));
        assert!(is_sane_date(&Utc.with_ymd_and_hms(1701, 1, 1, 0, 0, 0).unwrap()));
        let next_year = Utc::now().year() + 1;
        assert!(is_sane_date(&Utc.with_ymd_and_hms(next_year, 6, 1, 0, 0, 0).unwrap()));
        assert!(!is_sane_date(&Utc.with_ymd_and_hms(next_year + 1, 1, 1, 0, 0, 0).unwrap()));
    }

    #[test]
    fn test_best_date_prefers_higher_priority() {
        let priorities = default_date_tags();
        let mut selector = BestDateSelector::new(&priorities);
        let modified = Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap();

        assert!(selector.offer("File.FileModifiedDate", &TagValue::Date(modified)));
        assert!(selector.offer(
            "Exif.DateTimeOriginal",
            &TagValue::Text("2010:05:06 07:08:09".to_string())
        ));
        assert!(!selector.offer(
            "Exif.DateTime",
            &TagValue::Text("2012:01:01 00:00:00".to_string())
        ));

        assert_eq!(selector.best_source(), Some("Exif.DateTimeOriginal"));
        assert_eq!(
            selector.best(),
            Some(Utc.with_ymd_and_hms(2010, 5, 6, 7, 8, 9).unwrap())
        );
    }

    #[test]
    fn test_best_date_ignores_insane_and_unlisted() {
        let priorities = default_date_tags();
        let mut selector = BestDateSelector::new(&priorities);
        assert!(!selector.offer(
            "Exif.DateTimeOriginal",
            &TagValue::Text("1601:01:01 00:00:00".to_string())
        ));
        assert!(!selector.offer(
            "Exif.GPSDateStamp",
            &TagValue::Text("2010:05:06 07:08:09".to_string())
        ));
        assert_eq!(selector.best(), None);
    }

    #[test]
    fn test_best_date_is_order_independent() {
        let tags = vec![
            RawTag::new(
                "File",
                "FileModifiedDate",
                TagValue::Date(Utc.with_ymd_and_hms(2022, 3, 3, 0, 0, 0).unwrap()),
            ),
            text("Exif", "DateTime", "2019:02:02 00:00:00"),
            text("Exif", "DateTimeDigitized", "2018:01:01 00:00:00"),
            text("Exif", "DateTimeOriginal", "1500:01:01 00:00:00"),
        ];
        let processor = MetadataProcessor::default();

        let mut forward = AssetDocument::new("/f.jpg");
        processor.apply_tags(&mut forward, &tags).unwrap();

        let mut reversed_tags = tags.clone();
        reversed_tags.reverse();
        let mut backward = AssetDocument::new("/f.jpg");
        processor.apply_tags(&mut backward, &reversed_tags).unwrap();

        let expected = Utc.with_ymd_and_hms(2018, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(forward.get_date("source.date"), Some(expected));
        assert_eq!(backward.get_date("source.date"), Some(expected));
    }

    #[test]
    fn test_apply_tags_stores_values_and_keywords() {
        let processor = MetadataProcessor::default();
        let mut doc = AssetDocument::new("/a.jpg");
        let tags = vec![
            text("Exif", "Make", "Canon"),
            text("Exif", "Software", &"x".repeat(300)),
            RawTag::new("Exif", "FNumber", TagValue::Rational(2.8)).with_description("f/2.8"),
            RawTag::new("Exif", "Orientation", TagValue::Int(1)).with_description("1"),
            RawTag::new("Exif", "MakerNote", TagValue::Bytes(vec![0, 1, 2])),
            RawTag::new("Exif", "Huge", TagValue::Float(f64::INFINITY)),
        ];
        processor.apply_tags(&mut doc, &tags).unwrap();

        assert_eq!(doc.get_str("image.Exif.Make"), Some("Canon"));
        assert!(!doc.attr_exists("image.Exif.Software"));
        assert_eq!(doc.get_f64("image.Exif.FNumber"), Some(2.8));
        assert_eq!(doc.get_str("image.Exif.FNumber_description"), Some("f/2.8"));
        assert!(!doc.attr_exists("image.Exif.Orientation_description"));
        assert!(!doc.attr_exists("image.Exif.MakerNote"));
        assert_eq!(doc.get_f64("image.Exif.Huge"), Some(1e308));

        let canon = doc.keywords().get("keywords", "Canon").unwrap();
        assert_eq!(canon.confidence, 1.0);
        assert!(canon.suggest);
    }

    #[test]
    fn test_gps_location() {
        let processor = MetadataProcessor::default();
        let mut doc = AssetDocument::new("/a.jpg");
        let tags = vec![
            RawTag::new("GPS", "GPSLatitude", TagValue::RationalList(vec![33.0, 51.0, 54.0])),
            text("GPS", "GPSLatitudeRef", "S"),
            RawTag::new("GPS", "GPSLongitude", TagValue::RationalList(vec![151.0, 12.0, 36.0])),
            text("GPS", "GPSLongitudeRef", "E"),
        ];
        processor.apply_tags(&mut doc, &tags).unwrap();

        let location: LocationSchema = doc.get_schema().unwrap().unwrap();
        assert!((location.lat - -33.865).abs() < 1e-9);
        assert!((location.lon - 151.21).abs() < 1e-9);
    }

    #[test]
    fn test_dms_sign_handling() {
        assert!((dms_to_degrees(40.0, 30.0, 0.0, false) - 40.5).abs() < 1e-12);
        assert!((dms_to_degrees(40.0, 30.0, 0.0, true) + 40.5).abs() < 1e-12);
        assert!((dms_to_degrees(-40.0, 30.0, 0.0, false) + 40.5).abs() < 1e-12);
    }

    #[test]
    fn test_orientation_six_swaps_dimensions() {
        let processor = MetadataProcessor::default();
        let mut doc = AssetDocument::new("/a.jpg");
        doc.set_attr("image.Exif.Orientation", 6_i64).unwrap();
        processor.apply_dimensions(&mut doc, 4000, 3000).unwrap();

        let image: ImageSchema = doc.get_schema().unwrap().unwrap();
        assert_eq!((image.width, image.height), (Some(3000), Some(4000)));
    }

    #[test]
    fn test_rating_copied_only_on_first_ingest() {
        let processor = MetadataProcessor::default();
        let mut doc = AssetDocument::new("/a.jpg");
        doc.set_attr("image.Xmp.Rating", 4_i64).unwrap();
        processor.apply_rating(&mut doc).unwrap();
        assert_eq!(doc.get_i64("user.rating"), Some(4));

        let mut updated = AssetDocument::new("/b.jpg");
        updated.with_previous_version(&serde_json::json!({ "attributes": {} }));
        updated.set_attr("image.Xmp.Rating", 2_i64).unwrap();
        processor.apply_rating(&mut updated).unwrap();
        assert!(!updated.attr_exists("user.rating"));
    }

    #[test]
    fn test_process_png_without_exif() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plain.png");
        image::RgbImage::new(20, 10).save(&path).unwrap();

        let mut doc = AssetDocument::new(&path);
        MetadataProcessor::default().process(&mut doc).unwrap();

        let image: ImageSchema = doc.get_schema().unwrap().unwrap();
        assert_eq!((image.width, image.height), (Some(20), Some(10)));
        assert_eq!(doc.get_i64("image.File.FileSize"), Some(std::fs::metadata(&path).unwrap().len() as i64));
        assert!(doc.attr_exists("source.date"));
    }
}

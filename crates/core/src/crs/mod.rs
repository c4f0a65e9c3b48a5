//! Coordinate Reference System handling

mod transform;

pub use transform::{reproject_point, CrsTransform};

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Coordinate Reference System representation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CRS {
    /// WKT representation, as found in a `.prj` sidecar
    wkt: Option<String>,
    /// EPSG code if known
    epsg: Option<u32>,
    /// PROJ string if available
    proj: Option<String>,
}

impl CRS {
    /// Create a CRS from an EPSG code
    pub fn from_epsg(code: u32) -> Self {
        Self {
            wkt: None,
            epsg: Some(code),
            proj: None,
        }
    }

    /// Create a CRS from a WKT string, without attempting EPSG detection
    pub fn from_wkt(wkt: impl Into<String>) -> Self {
        Self {
            wkt: Some(wkt.into()),
            epsg: None,
            proj: None,
        }
    }

    /// Create a CRS from a `.prj` WKT string, detecting the EPSG code when possible
    pub fn from_prj_wkt(wkt: impl Into<String>) -> Self {
        let wkt = wkt.into();
        let epsg = epsg_from_wkt(&wkt);
        Self {
            wkt: Some(wkt),
            epsg,
            proj: None,
        }
    }

    /// Create a CRS from a PROJ string
    pub fn from_proj(proj: impl Into<String>) -> Self {
        Self {
            wkt: None,
            epsg: None,
            proj: Some(proj.into()),
        }
    }

    /// WGS84 geographic CRS (EPSG:4326)
    pub fn wgs84() -> Self {
        Self::from_epsg(4326)
    }

    /// Get EPSG code if known
    pub fn epsg(&self) -> Option<u32> {
        self.epsg
    }

    /// Get WKT representation
    pub fn wkt(&self) -> Option<&str> {
        self.wkt.as_deref()
    }

    /// Get PROJ string
    pub fn proj(&self) -> Option<&str> {
        self.proj.as_deref()
    }

    /// PROJ definition used for reprojection: the explicit PROJ string, or the
    /// EPSG database entry.
    pub fn proj_definition(&self) -> Option<&str> {
        if let Some(proj) = self.proj.as_deref() {
            return Some(proj);
        }
        self.epsg
            .and_then(|code| u16::try_from(code).ok())
            .and_then(crs_definitions::from_code)
            .map(|def| def.proj4)
    }

    /// Whether coordinates in this CRS are longitude/latitude degrees
    pub fn is_geographic(&self) -> bool {
        match self.proj_definition() {
            Some(def) => ["+proj=longlat", "+proj=latlong", "+proj=lonlat", "+proj=latlon"]
                .iter()
                .any(|p| def.contains(p)),
            None => self.epsg == Some(4326),
        }
    }

    /// Check if two CRS are equivalent
    pub fn is_equivalent(&self, other: &CRS) -> bool {
        if let (Some(a), Some(b)) = (self.epsg, other.epsg) {
            return a == b;
        }

        if let (Some(a), Some(b)) = (&self.proj, &other.proj) {
            return a == b;
        }

        if let (Some(a), Some(b)) = (&self.wkt, &other.wkt) {
            return a == b;
        }

        false
    }

    /// Get a string identifier for this CRS
    pub fn identifier(&self) -> String {
        if let Some(code) = self.epsg {
            return format!("EPSG:{}", code);
        }
        if let Some(proj) = &self.proj {
            return proj.clone();
        }
        if let Some(wkt) = &self.wkt {
            let head: String = wkt.chars().take(50).collect();
            return format!("WKT:{}", head);
        }
        "Unknown".to_string()
    }

    /// OGC URN for this CRS, as used by legacy GeoJSON `crs` members
    pub fn urn(&self) -> Option<String> {
        self.epsg.map(|code| format!("urn:ogc:def:crs:EPSG::{}", code))
    }
}

impl FromStr for CRS {
    type Err = Error;

    /// Parse `EPSG:32722`, `32722`, `urn:ogc:def:crs:EPSG::32722`,
    /// `urn:ogc:def:crs:OGC:1.3:CRS84`, a `+proj=` string or WKT.
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let invalid = || Error::InvalidParameter {
            name: "crs",
            value: s.to_string(),
            reason: "expected EPSG:<code>, an OGC URN, a PROJ string or WKT".into(),
        };

        if s.starts_with('+') {
            return Ok(CRS::from_proj(s));
        }

        let upper = s.to_ascii_uppercase();
        if ["PROJCS[", "GEOGCS[", "PROJCRS[", "GEOGCRS[", "GEODCRS["]
            .iter()
            .any(|p| upper.starts_with(p))
        {
            return Ok(CRS::from_prj_wkt(s));
        }

        if upper.ends_with("CRS84") {
            return Ok(CRS::wgs84());
        }

        let code = if let Some(rest) = upper.strip_prefix("EPSG:") {
            rest
        } else if upper.starts_with("URN:OGC:DEF:CRS:EPSG:") {
            upper.rsplit(':').next().unwrap_or_default()
        } else {
            upper.as_str()
        };

        code.trim()
            .parse::<u32>()
            .map(CRS::from_epsg)
            .map_err(|_| invalid())
    }
}

impl fmt::Display for CRS {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.identifier())
    }
}

impl Default for CRS {
    fn default() -> Self {
        Self::wgs84()
    }
}

/// Detect the EPSG code of a WKT1 / ESRI `.prj` definition.
///
/// The outermost `AUTHORITY["EPSG", ...]` wins; nested datum and GEOGCS
/// authorities come earlier in the string. ESRI files usually carry no
/// authority, so the common WGS 84 and SIRGAS 2000 names are recognized.
fn epsg_from_wkt(wkt: &str) -> Option<u32> {
    if let Some(code) = last_epsg_authority(wkt) {
        return Some(code);
    }

    let name = wkt
        .split_once('"')
        .and_then(|(_, rest)| rest.split_once('"'))
        .map(|(name, _)| name.to_ascii_uppercase().replace(|c: char| c == ' ' || c == '/', "_"))?;
    let name = name.split('_').filter(|t| !t.is_empty()).collect::<Vec<_>>().join("_");

    match name.as_str() {
        "GCS_WGS_1984" | "WGS_84" | "WGS_1984" => return Some(4326),
        "GCS_SIRGAS_2000" | "SIRGAS_2000" => return Some(4674),
        _ => {}
    }

    let (datum, zone) = name.split_once("_UTM_ZONE_")?;
    let (digits, hemisphere) = zone.split_at(zone.find(|c: char| c == 'N' || c == 'S')?);
    let zone: u32 = digits.parse().ok()?;
    let north = hemisphere.starts_with('N');

    match datum {
        "WGS_1984" | "WGS_84" if (1..=60).contains(&zone) => {
            Some(if north { 32600 + zone } else { 32700 + zone })
        }
        "SIRGAS_2000" if north && (11..=22).contains(&zone) => Some(31965 + zone - 11),
        "SIRGAS_2000" if !north && (17..=25).contains(&zone) => Some(31977 + zone - 17),
        _ => None,
    }
}

fn last_epsg_authority(wkt: &str) -> Option<u32> {
    let upper = wkt.to_ascii_uppercase();
    let start = upper.rfind("AUTHORITY[\"EPSG\"")?;
    upper[start..]
        .split('"')
        .nth(3)
        .and_then(|code| code.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crs_epsg() {
        let crs = CRS::from_epsg(4326);
        assert_eq!(crs.epsg(), Some(4326));
        assert_eq!(crs.identifier(), "EPSG:4326");
        assert_eq!(crs.urn().as_deref(), Some("urn:ogc:def:crs:EPSG::4326"));
    }

    #[test]
    fn test_crs_equivalence() {
        let a = CRS::from_epsg(4326);
        let b = CRS::wgs84();
        assert!(a.is_equivalent(&b));
        assert!(!a.is_equivalent(&CRS::from_epsg(32722)));
        assert!(!a.is_equivalent(&CRS::from_wkt("LOCAL_CS[\"x\"]")));
    }

    #[test]
    fn test_parse_identifiers() {
        assert_eq!("EPSG:32722".parse::<CRS>().unwrap().epsg(), Some(32722));
        assert_eq!("epsg:4674".parse::<CRS>().unwrap().epsg(), Some(4674));
        assert_eq!("31982".parse::<CRS>().unwrap().epsg(), Some(31982));
        assert_eq!(
            "urn:ogc:def:crs:EPSG::32722".parse::<CRS>().unwrap().epsg(),
            Some(32722)
        );
        assert_eq!(
            "urn:ogc:def:crs:OGC:1.3:CRS84".parse::<CRS>().unwrap().epsg(),
            Some(4326)
        );
        let proj = "+proj=utm +zone=22 +south +datum=WGS84 +units=m +no_defs";
        assert_eq!(proj.parse::<CRS>().unwrap().proj(), Some(proj));
        assert!("not-a-crs".parse::<CRS>().is_err());
    }

    #[test]
    fn test_prj_with_authority() {
        let wkt = r#"PROJCS["WGS 84 / UTM zone 22S",GEOGCS["WGS 84",DATUM["WGS_1984",SPHEROID["WGS 84",6378137,298.257223563,AUTHORITY["EPSG","7030"]],AUTHORITY["EPSG","6326"]],PRIMEM["Greenwich",0],UNIT["degree",0.0174532925199433],AUTHORITY["EPSG","4326"]],PROJECTION["Transverse_Mercator"],UNIT["metre",1],AUTHORITY["EPSG","32722"]]"#;
        assert_eq!(CRS::from_prj_wkt(wkt).epsg(), Some(32722));
    }

    #[test]
    fn test_prj_esri_names() {
        let utm = r#"PROJCS["WGS_1984_UTM_Zone_22S",GEOGCS["GCS_WGS_1984",DATUM["D_WGS_1984",SPHEROID["WGS_1984",6378137.0,298.257223563]]],PROJECTION["Transverse_Mercator"]]"#;
        assert_eq!(CRS::from_prj_wkt(utm).epsg(), Some(32722));

        let sirgas = r#"PROJCS["SIRGAS_2000_UTM_Zone_22S",GEOGCS["GCS_SIRGAS_2000"]]"#;
        assert_eq!(CRS::from_prj_wkt(sirgas).epsg(), Some(31982));

        let geographic = r#"GEOGCS["GCS_SIRGAS_2000",DATUM["D_SIRGAS_2000"]]"#;
        assert_eq!(CRS::from_prj_wkt(geographic).epsg(), Some(4674));

        let unknown = r#"PROJCS["Custom_Albers",GEOGCS["GCS_WGS_1984"]]"#;
        assert_eq!(CRS::from_prj_wkt(unknown).epsg(), None);
    }

    #[test]
    fn test_geographic_detection() {
        assert!(CRS::wgs84().is_geographic());
        assert!(CRS::from_epsg(4674).is_geographic());
        assert!(!CRS::from_epsg(32722).is_geographic());
    }
}

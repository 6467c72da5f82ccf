use std::fs;
use std::path::Path;

use csv::Writer;
use serde::Serialize;

use crate::errors::{AgroScanError, Result};
use crate::regions::Region;

/// Write a serializable analysis report as pretty JSON.
pub fn write_json_report<T: Serialize, P: AsRef<Path>>(report: &T, output_path: P) -> Result<()> {
    let output_path = output_path.as_ref();
    if let Some(parent) = output_path.parent() {
        fs::create_dir_all(parent).map_err(AgroScanError::Io)?;
    }

    let content = serde_json::to_string_pretty(report).map_err(AgroScanError::JsonOutput)?;
    fs::write(output_path, content).map_err(AgroScanError::Io)?;

    Ok(())
}

/// Write a flat region table to CSV
pub fn write_regions_csv<P: AsRef<Path>>(regions: &[Region], output_path: P) -> Result<()> {
    let output_path = output_path.as_ref();
    if let Some(parent) = output_path.parent() {
        fs::create_dir_all(parent).map_err(AgroScanError::Io)?;
    }

    let mut writer = Writer::from_path(output_path).map_err(AgroScanError::CsvOutput)?;

    writer
        .write_record([
            "Id",
            "Kind",
            "Center_X",
            "Center_Y",
            "Area_Pixels",
            "BBox_X_Min",
            "BBox_Y_Min",
            "BBox_X_Max",
            "BBox_Y_Max",
        ])
        .map_err(AgroScanError::CsvOutput)?;

    for region in regions {
        writer
            .write_record([
                region.id.to_string(),
                region.kind.label().to_string(),
                region.center.0.to_string(),
                region.center.1.to_string(),
                region.area_pixels.to_string(),
                region.bbox.0.to_string(),
                region.bbox.1.to_string(),
                region.bbox.2.to_string(),
                region.bbox.3.to_string(),
            ])
            .map_err(AgroScanError::CsvOutput)?;
    }

    writer
        .flush()
        .map_err(|e| AgroScanError::CsvOutput(csv::Error::from(e)))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::regions::RegionKind;

    #[test]
    fn csv_has_header_and_one_row_per_region() {
        let regions = vec![
            Region {
                id: 1,
                kind: RegionKind::Canopy,
                center: (10, 12),
                area_pixels: 400,
                bbox: (0, 2, 19, 22),
            },
            Region {
                id: 2,
                kind: RegionKind::Chlorosis,
                center: (50, 60),
                area_pixels: 120,
                bbox: (45, 55, 55, 65),
            },
        ];
        let dir = std::env::temp_dir().join("agroscan_output_test");
        let path = dir.join("regions.csv");
        write_regions_csv(&regions, &path).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.trim().lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("Id,Kind"));
        assert!(lines[1].contains("canopy"));
        assert!(lines[2].contains("chlorosis"));

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn json_report_round_trips() {
        #[derive(Serialize)]
        struct Minimal {
            value: u32,
        }
        let dir = std::env::temp_dir().join("agroscan_json_test");
        let path = dir.join("report.json");
        write_json_report(&Minimal { value: 7 }, &path).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&content).unwrap();
        assert_eq!(parsed["value"], 7);

        fs::remove_dir_all(&dir).ok();
    }
}

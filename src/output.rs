use std::fs;
use std::path::Path;

use csv::Writer;
use serde::{Deserialize, Serialize};

use crate::canopy::CanopyMeasurement;
use crate::errors::{Result, VegMetricsError};
use crate::measurement::MeasurementResult;
use crate::profile::HeightProfile;
use crate::quadrat::QuadratMeasurement;

/// One analyzed input within a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionEntry {
    pub filename: String,
    pub result: MeasurementResult,
}

/// An input the session could not analyze.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionFailure {
    pub filename: String,
    pub message: String,
}

/// A persisted survey session: engine results plus the caller-supplied site
/// metadata the engine itself never touches.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub site_name: Option<String>,
    pub note: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub entries: Vec<SessionEntry>,
    pub failures: Vec<SessionFailure>,
}

impl SessionRecord {
    pub fn new(site_name: Option<String>, note: Option<String>) -> Self {
        Self {
            site_name,
            note,
            latitude: None,
            longitude: None,
            entries: Vec::new(),
            failures: Vec::new(),
        }
    }
}

fn create_writer(output_dir: &Path, name: &str) -> Result<Writer<fs::File>> {
    fs::create_dir_all(output_dir).map_err(VegMetricsError::Io)?;
    Writer::from_path(output_dir.join(name)).map_err(VegMetricsError::CsvOutput)
}

/// Write canopy measurements to `canopy.csv`, one row per frame.
pub fn write_canopy_csv<P: AsRef<Path>>(
    results: &[(String, CanopyMeasurement)],
    output_dir: P,
) -> Result<()> {
    let mut writer = create_writer(output_dir.as_ref(), "canopy.csv")?;

    writer
        .write_record([
            "Filename",
            "Method",
            "Zenith_Deg",
            "Canopy_Cover_Perc",
            "Light_Transmission_Perc",
            "Leaf_Area_Index",
            "Pixels_Considered",
            "Canopy_Pixels",
            "Sky_Pixels",
            "Elapsed_Ms",
        ])
        .map_err(VegMetricsError::CsvOutput)?;

    for (filename, result) in results {
        let lai = result
            .leaf_area_index
            .map(|v| format!("{:.3}", v))
            .unwrap_or_else(|| "NA".to_string());

        writer
            .write_record(&[
                filename.clone(),
                result.method.name().to_string(),
                format!("{:.1}", result.zenith_angle_deg),
                format!("{:.2}", result.canopy_cover_pct),
                format!("{:.2}", result.light_transmission_pct),
                lai,
                result.counts.total.to_string(),
                result.counts.positive.to_string(),
                result.counts.negative.to_string(),
                result.elapsed_ms.to_string(),
            ])
            .map_err(VegMetricsError::CsvOutput)?;
    }

    writer
        .flush()
        .map_err(|e| VegMetricsError::CsvOutput(csv::Error::from(e)))?;

    Ok(())
}

/// Write a height profile to `profile.csv`, one row per sample height.
pub fn write_profile_csv<P: AsRef<Path>>(profile: &HeightProfile, output_dir: P) -> Result<()> {
    let mut writer = create_writer(output_dir.as_ref(), "profile.csv")?;

    writer
        .write_record([
            "Height_Cm",
            "Coverage_Perc",
            "Density_Index",
            "Total_Pixels",
            "Green_Pixels",
        ])
        .map_err(VegMetricsError::CsvOutput)?;

    for reading in &profile.readings {
        writer
            .write_record(&[
                reading.height_cm.to_string(),
                format!("{:.2}", reading.coverage_pct),
                format!("{:.2}", reading.density_index),
                reading.counts.total.to_string(),
                reading.counts.positive.to_string(),
            ])
            .map_err(VegMetricsError::CsvOutput)?;
    }

    writer
        .flush()
        .map_err(|e| VegMetricsError::CsvOutput(csv::Error::from(e)))?;

    Ok(())
}

/// Write quadrat measurements to `quadrat.csv`, one row per frame.
pub fn write_quadrat_csv<P: AsRef<Path>>(
    results: &[(String, QuadratMeasurement)],
    output_dir: P,
) -> Result<()> {
    let mut writer = create_writer(output_dir.as_ref(), "quadrat.csv")?;

    writer
        .write_record([
            "Filename",
            "Vegetation_Perc",
            "Litter_Perc",
            "Bare_Soil_Perc",
            "Rock_Perc",
            "Total_Cover_Perc",
            "Bare_Ground_Perc",
            "Species_Count",
            "Shannon_Index",
            "Evenness_Index",
            "Elapsed_Ms",
        ])
        .map_err(VegMetricsError::CsvOutput)?;

    for (filename, result) in results {
        let (species_count, shannon, evenness) = match &result.diversity {
            Some(d) => (
                d.species_count.to_string(),
                format!("{:.3}", d.shannon_index),
                format!("{:.3}", d.evenness_index),
            ),
            None => ("0".to_string(), "NA".to_string(), "NA".to_string()),
        };

        writer
            .write_record(&[
                filename.clone(),
                format!("{:.2}", result.vegetation_pct),
                format!("{:.2}", result.litter_pct),
                format!("{:.2}", result.bare_soil_pct),
                format!("{:.2}", result.rock_pct),
                format!("{:.2}", result.total_cover_pct),
                format!("{:.2}", result.bare_ground_pct),
                species_count,
                shannon,
                evenness,
                result.elapsed_ms.to_string(),
            ])
            .map_err(VegMetricsError::CsvOutput)?;
    }

    writer
        .flush()
        .map_err(|e| VegMetricsError::CsvOutput(csv::Error::from(e)))?;

    Ok(())
}

/// Persist the full session as `session.json`.
pub fn write_session_json<P: AsRef<Path>>(session: &SessionRecord, output_dir: P) -> Result<()> {
    let output_dir = output_dir.as_ref();
    fs::create_dir_all(output_dir).map_err(VegMetricsError::Io)?;

    let content = serde_json::to_string_pretty(session).map_err(VegMetricsError::Json)?;
    fs::write(output_dir.join("session.json"), content).map_err(VegMetricsError::Io)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::ClassificationMethod;
    use crate::measurement::AggregateCounts;

    fn temp_output_dir(tag: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("veg_metrics_test_{}_{}", tag, std::process::id()))
    }

    fn sample_canopy() -> CanopyMeasurement {
        CanopyMeasurement {
            method: ClassificationMethod::BrightnessGreenness,
            canopy_cover_pct: 62.5,
            light_transmission_pct: 37.5,
            leaf_area_index: Some(0.981),
            counts: AggregateCounts {
                total: 16,
                positive: 10,
                negative: 6,
            },
            zenith_angle_deg: 90.0,
            elapsed_ms: 3,
        }
    }

    #[test]
    fn canopy_csv_round_trips_through_disk() {
        let dir = temp_output_dir("canopy");
        let rows = vec![("plot_a".to_string(), sample_canopy())];
        write_canopy_csv(&rows, &dir).unwrap();

        let content = fs::read_to_string(dir.join("canopy.csv")).unwrap();
        assert!(content.starts_with("Filename,Method,Zenith_Deg"));
        assert!(content.contains("plot_a,brightness_greenness,90.0,62.50,37.50,0.981"));

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn session_json_serializes_entries_and_failures() {
        let dir = temp_output_dir("session");
        let mut session = SessionRecord::new(Some("north ridge".into()), None);
        session.entries.push(SessionEntry {
            filename: "plot_a".into(),
            result: MeasurementResult::Canopy(sample_canopy()),
        });
        session.failures.push(SessionFailure {
            filename: "plot_b".into(),
            message: "Analysis region contains no pixels".into(),
        });

        write_session_json(&session, &dir).unwrap();

        let content = fs::read_to_string(dir.join("session.json")).unwrap();
        let parsed: SessionRecord = serde_json::from_str(&content).unwrap();
        assert_eq!(parsed.site_name.as_deref(), Some("north ridge"));
        assert_eq!(parsed.entries.len(), 1);
        assert_eq!(parsed.failures.len(), 1);

        fs::remove_dir_all(&dir).unwrap();
    }
}

/// Assembles AT reports from candidate light curves
use crate::config::ReporterInfo;
use crate::domain::{
    AtReport, BulkReport, Candidate, Coordinate, InstrumentInfo, NonDetection, NonDetectionKind,
    Photometry, PhotometryPoint,
};
use crate::errors::ReportError;
use std::collections::BTreeMap;

/// Positional uncertainty reported for both axes
const COORDINATE_ERROR_ARCSEC: &str = "2";

const ARCHIVE_OTHER: &str = "0";
const ARCHIVAL_REMARKS: &str = "Non-detection limits not available w/o active survey";

/// Map a survey filter code (1 = g, 2 = r, 3 = i) to the TNS filter id
pub fn tns_filter(code: u8) -> Result<&'static str, ReportError> {
    match code {
        1 => Ok("110"),
        2 => Ok("111"),
        3 => Ok("112"),
        other => Err(ReportError::UnknownFilter(other)),
    }
}

pub struct ReportBuilder {
    reporter: ReporterInfo,
    instrument: InstrumentInfo,
}

impl ReportBuilder {
    pub fn new(reporter: ReporterInfo) -> Self {
        Self {
            reporter,
            instrument: InstrumentInfo::ztf(),
        }
    }

    /// Build the AT report for one candidate
    pub fn build(&self, candidate: &Candidate) -> Result<AtReport, ReportError> {
        let lc = &candidate.photometry;
        let expected = lc.obsdates.len();
        check_len("fluxes", expected, lc.fluxes.len())?;
        check_len("flux_errors", expected, lc.flux_errors.len())?;
        check_len("limiting_magnitudes", expected, lc.limiting_magnitudes.len())?;
        check_len("filters", expected, lc.filters.len())?;
        if expected == 0 {
            return Err(ReportError::NoPhotometry);
        }
        check_finite("ra", candidate.ra)?;
        check_finite("dec", candidate.dec)?;
        if let Some(prior) = candidate.non_detection {
            check_finite("non_detection.obsdate", prior.obsdate)?;
            check_finite("non_detection.limiting_flux", prior.limiting_flux)?;
        }

        let mut photometry_group = BTreeMap::new();
        let mut discovery = f64::INFINITY;
        for (i, obsdate) in lc.obsdates.iter().copied().enumerate() {
            check_finite(&format!("obsdates[{}]", i), obsdate)?;
            check_finite(&format!("fluxes[{}]", i), lc.fluxes[i])?;
            check_finite(&format!("flux_errors[{}]", i), lc.flux_errors[i])?;
            check_finite(&format!("limiting_magnitudes[{}]", i), lc.limiting_magnitudes[i])?;
            let point = PhotometryPoint {
                obsdate,
                flux: lc.fluxes[i],
                flux_error: lc.flux_errors[i],
                limiting_flux: lc.limiting_magnitudes[i],
                filter_value: tns_filter(lc.filters[i])?.to_string(),
                instrument: self.instrument.clone(),
            };
            photometry_group.insert(i.to_string(), point);
            discovery = discovery.min(obsdate);
        }

        let kind = match candidate.non_detection {
            Some(prior) => NonDetectionKind::Observed {
                obsdate: prior.obsdate,
                limiting_flux: prior.limiting_flux,
            },
            None => NonDetectionKind::Archival {
                archiveid: ARCHIVE_OTHER.to_string(),
                archival_remarks: ARCHIVAL_REMARKS.to_string(),
            },
        };

        Ok(AtReport {
            groupid: self.reporter.group_id.clone(),
            reporter: self.reporter.reporter.clone(),
            at_type: self.reporter.at_type.clone(),
            internal_name: candidate.internal_name.clone(),
            ra: coordinate(candidate.ra),
            dec: coordinate(candidate.dec),
            non_detection: NonDetection {
                kind,
                instrument: self.instrument.clone(),
            },
            photometry: Photometry { photometry_group },
            discovery_datetime: discovery,
        })
    }

    /// Build a bulk submission holding just this candidate
    pub fn build_bulk(&self, candidate: &Candidate) -> Result<BulkReport, ReportError> {
        self.build(candidate).map(BulkReport::single)
    }
}

fn coordinate(value: f64) -> Coordinate {
    Coordinate {
        value,
        error: COORDINATE_ERROR_ARCSEC.to_string(),
        units: "arcsec".to_string(),
    }
}

// JSON has no encoding for NaN or infinities
fn check_finite(field: &str, value: f64) -> Result<(), ReportError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ReportError::NotFinite {
            field: field.to_string(),
        })
    }
}

fn check_len(field: &'static str, expected: usize, found: usize) -> Result<(), ReportError> {
    if expected == found {
        Ok(())
    } else {
        Err(ReportError::LengthMismatch {
            field,
            expected,
            found,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{LightCurve, PriorNonDetection};

    fn candidate(obsdates: Vec<f64>, filters: Vec<u8>) -> Candidate {
        let n = obsdates.len();
        Candidate {
            internal_name: "ZTF18abcdefg".to_string(),
            ra: 23.4621,
            dec: 30.6599417,
            non_detection: None,
            photometry: LightCurve {
                obsdates,
                fluxes: vec![19.0; n],
                flux_errors: vec![0.1; n],
                limiting_magnitudes: vec![20.5; n],
                filters,
            },
        }
    }

    #[test]
    fn test_filter_mapping() {
        assert_eq!(tns_filter(1), Ok("110"));
        assert_eq!(tns_filter(2), Ok("111"));
        assert_eq!(tns_filter(3), Ok("112"));
        assert_eq!(tns_filter(4), Err(ReportError::UnknownFilter(4)));
    }

    #[test]
    fn test_single_r_band_point_without_non_detection() {
        let builder = ReportBuilder::new(ReporterInfo::default());
        let report = builder.build(&candidate(vec![2458380.7], vec![2])).unwrap();
        let json = serde_json::to_value(&report).unwrap();

        assert_eq!(json["photometry"]["photometry_group"]["0"]["filter_value"], "111");
        assert_eq!(json["non_detection"]["archiveid"], "0");
        assert_eq!(json["non_detection"]["archival_remarks"], ARCHIVAL_REMARKS);
        assert_eq!(json["non_detection"]["instrument_value"], "196");
        assert_eq!(json["groupid"], "48");
        assert_eq!(json["ra"]["units"], "arcsec");
    }

    #[test]
    fn test_discovery_is_earliest_obsdate() {
        let builder = ReportBuilder::new(ReporterInfo::default());
        let report = builder
            .build(&candidate(vec![2458382.1, 2458380.9, 2458381.5], vec![1, 2, 3]))
            .unwrap();
        assert_eq!(report.discovery_datetime, 2458380.9);
        assert_eq!(report.photometry.photometry_group.len(), 3);
    }

    #[test]
    fn test_photometry_carries_measured_values() {
        let builder = ReportBuilder::new(ReporterInfo::default());
        let mut c = candidate(vec![2458380.7], vec![1]);
        c.photometry.fluxes = vec![18.25];
        c.photometry.flux_errors = vec![0.07];
        c.photometry.limiting_magnitudes = vec![20.9];
        let report = builder.build(&c).unwrap();
        let point = &report.photometry.photometry_group["0"];
        assert_eq!(point.flux, 18.25);
        assert_eq!(point.flux_error, 0.07);
        assert_eq!(point.limiting_flux, 20.9);
    }

    #[test]
    fn test_observed_non_detection() {
        let builder = ReportBuilder::new(ReporterInfo::default());
        let mut c = candidate(vec![2458380.7], vec![1]);
        c.non_detection = Some(PriorNonDetection {
            obsdate: 2458378.7,
            limiting_flux: 20.3,
        });
        let json = serde_json::to_value(builder.build(&c).unwrap()).unwrap();
        assert_eq!(json["non_detection"]["obsdate"], 2458378.7);
        assert_eq!(json["non_detection"]["limiting_flux"], 20.3);
        assert!(json["non_detection"].get("archiveid").is_none());
        assert_eq!(json["non_detection"]["flux_units"], "1");
    }

    #[test]
    fn test_unknown_filter_fails() {
        let builder = ReportBuilder::new(ReporterInfo::default());
        let err = builder.build(&candidate(vec![2458380.7], vec![7])).unwrap_err();
        assert_eq!(err, ReportError::UnknownFilter(7));
    }

    #[test]
    fn test_length_mismatch_fails() {
        let builder = ReportBuilder::new(ReporterInfo::default());
        let mut c = candidate(vec![2458380.7, 2458381.7], vec![1, 2]);
        c.photometry.flux_errors.pop();
        assert_eq!(
            builder.build(&c).unwrap_err(),
            ReportError::LengthMismatch {
                field: "flux_errors",
                expected: 2,
                found: 1
            }
        );
    }

    #[test]
    fn test_empty_light_curve_fails() {
        let builder = ReportBuilder::new(ReporterInfo::default());
        assert_eq!(
            builder.build(&candidate(vec![], vec![])).unwrap_err(),
            ReportError::NoPhotometry
        );
    }

    #[test]
    fn test_non_finite_flux_fails() {
        let builder = ReportBuilder::new(ReporterInfo::default());
        let mut c = candidate(vec![2458380.7, 2458381.7], vec![1, 2]);
        c.photometry.fluxes[1] = f64::NAN;
        assert_eq!(
            builder.build(&c).unwrap_err(),
            ReportError::NotFinite {
                field: "fluxes[1]".to_string()
            }
        );
    }

    #[test]
    fn test_bulk_wraps_under_sequence_zero() {
        let builder = ReportBuilder::new(ReporterInfo::default());
        let bulk = builder
            .build_bulk(&candidate(vec![2458380.7], vec![2]))
            .unwrap();
        let json = serde_json::to_value(&bulk).unwrap();
        assert_eq!(json["at_report"]["0"]["internal_name"], "ZTF18abcdefg");
    }
}

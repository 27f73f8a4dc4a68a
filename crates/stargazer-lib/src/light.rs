//! Light-pollution annotation and derived sky-darkness measures.

use tracing::debug;

use crate::error::SearchError;
use crate::proximity::RoadCandidate;
use crate::retry::RetryPolicy;
use crate::sources::LightPollutionSource;

/// Natural sky background in mcd/m², added to artificial brightness.
pub const NATURAL_SKY_MCD: f64 = 0.171;

/// Lower SQM bounds of Bortle classes 1 through 8; anything darker than the
/// last bound is class 9.
const BORTLE_SQM_BOUNDS: [f64; 8] = [21.99, 21.89, 21.69, 20.49, 19.50, 18.94, 18.38, 17.80];

/// A road candidate with its sky brightness attached.
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotatedCandidate {
    pub candidate: RoadCandidate,
    /// Artificial sky brightness in mcd/m², `None` when unknown.
    pub brightness: Option<f64>,
}

/// Look up brightness for every candidate.
///
/// Points without coverage are annotated as unknown. With no source configured
/// every candidate is unknown.
pub fn annotate(
    candidates: Vec<RoadCandidate>,
    source: Option<&dyn LightPollutionSource>,
    retry: RetryPolicy,
) -> Result<Vec<AnnotatedCandidate>, SearchError> {
    let Some(source) = source else {
        return Ok(candidates
            .into_iter()
            .map(|candidate| AnnotatedCandidate {
                candidate,
                brightness: None,
            })
            .collect());
    };

    let mut annotated = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        let brightness = retry
            .run(|| source.brightness(candidate.seed.point))?
            .filter(|b| b.is_finite());
        annotated.push(AnnotatedCandidate {
            candidate,
            brightness,
        });
    }

    debug!(
        candidates = annotated.len(),
        unknown = annotated.iter().filter(|a| a.brightness.is_none()).count(),
        "light pollution annotated"
    );
    Ok(annotated)
}

/// Zenith sky quality in mag/arcsec² for an artificial brightness in mcd/m².
pub fn sky_quality(brightness_mcd: f64) -> f64 {
    let total_cd = (brightness_mcd.max(0.0) + NATURAL_SKY_MCD) / 1000.0;
    12.58 - 2.5 * total_cd.log10()
}

/// Bortle dark-sky class (1 = pristine, 9 = inner city) for a sky quality.
pub fn bortle_class(sqm: f64) -> u8 {
    BORTLE_SQM_BOUNDS
        .iter()
        .position(|bound| sqm >= *bound)
        .map_or(9, |i| i as u8 + 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SourceError;
    use crate::geo::GeoPoint;
    use crate::sources::RoadHit;
    use crate::terrain::TerrainSeed;

    struct EastIsBrighter;

    impl LightPollutionSource for EastIsBrighter {
        fn brightness(&self, point: GeoPoint) -> Result<Option<f64>, SourceError> {
            if point.lon > 117.0 {
                Ok(None)
            } else {
                Ok(Some((point.lon - 116.0) * 10.0))
            }
        }
    }

    fn candidate(lon: f64) -> RoadCandidate {
        RoadCandidate {
            seed: TerrainSeed {
                point: GeoPoint::new(40.0, lon),
                elevation: 200.0,
                relief: 60.0,
                cells: 1,
            },
            road: RoadHit {
                distance_km: 1.0,
                point: GeoPoint::new(40.01, lon),
                highway: "tertiary".into(),
                name: None,
            },
        }
    }

    #[test]
    fn natural_sky_is_about_22_mag() {
        let sqm = sky_quality(0.0);
        assert!((sqm - 22.0).abs() < 0.01, "{}", sqm);
        assert_eq!(bortle_class(sqm), 1);
    }

    #[test]
    fn brighter_skies_have_higher_bortle_class() {
        let classes: Vec<u8> = [0.0, 0.5, 5.0, 50.0, 5000.0]
            .iter()
            .map(|b| bortle_class(sky_quality(*b)))
            .collect();
        assert!(classes.windows(2).all(|w| w[0] <= w[1]), "{:?}", classes);
        assert_eq!(classes[4], 9);
    }

    #[test]
    fn annotates_and_marks_missing_coverage_unknown() {
        let annotated = annotate(
            vec![candidate(116.5), candidate(117.5)],
            Some(&EastIsBrighter),
            RetryPolicy::none(),
        )
        .unwrap();
        assert_eq!(annotated[0].brightness, Some(5.0));
        assert_eq!(annotated[1].brightness, None);
    }

    #[test]
    fn missing_source_marks_everything_unknown() {
        let annotated = annotate(vec![candidate(116.5)], None, RetryPolicy::none()).unwrap();
        assert_eq!(annotated[0].brightness, None);
    }
}

//! Wavelength × resolution products for one observation time.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use solar_common::MetadataKey;
use tracing::{info, instrument, warn};

use crate::disk::{AcquisitionResult, SolarDisk};
use crate::error::{AcquisitionError, Result};

/// What to do when one pair fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistryPolicy {
    /// The first failure aborts the build; in-flight acquisitions are dropped.
    #[default]
    AllOrNothing,
    /// Keep every success and record the failures.
    BestEffort,
}

/// One (wavelength, resolution) pair that could not be acquired.
#[derive(Debug)]
pub struct RegistryFailure {
    pub wavelength: u16,
    pub resolution: u32,
    pub error: Box<AcquisitionError>,
}

impl fmt::Display for RegistryFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}A/{}px: {}",
            self.wavelength, self.resolution, self.error
        )
    }
}

/// Acquisition results indexed by wavelength, then resolution.
///
/// Built once; nothing is added afterwards.
#[derive(Debug)]
pub struct DatasetRegistry {
    time: DateTime<Utc>,
    datasets: BTreeMap<u16, BTreeMap<u32, AcquisitionResult>>,
    failures: Vec<RegistryFailure>,
}

impl DatasetRegistry {
    /// Acquire every (wavelength, resolution) pair at `time`.
    ///
    /// Up to `max_concurrent` pairs run at once. Invalid wavelengths or
    /// resolutions are rejected before anything is fetched.
    #[instrument(skip(acquirer, wavelengths, resolutions), fields(
        wavelengths = wavelengths.len(),
        resolutions = resolutions.len(),
    ))]
    pub async fn build(
        acquirer: &SolarDisk,
        time: DateTime<Utc>,
        wavelengths: &BTreeSet<u16>,
        resolutions: &BTreeSet<u32>,
        apply_deconvolution: bool,
        policy: RegistryPolicy,
    ) -> Result<Self> {
        let mut keys = Vec::with_capacity(wavelengths.len() * resolutions.len());
        for &wavelength in wavelengths {
            for &resolution in resolutions {
                keys.push(MetadataKey::new(time, wavelength, resolution)?);
            }
        }
        let total = keys.len();

        let mut results = stream::iter(keys)
            .map(|key| async move { (key, acquirer.acquire(key, apply_deconvolution).await) })
            .buffer_unordered(acquirer.config().max_concurrent);

        let mut datasets: BTreeMap<u16, BTreeMap<u32, AcquisitionResult>> = BTreeMap::new();
        let mut failures = Vec::new();
        let mut completed = 0;

        while let Some((key, result)) = results.next().await {
            match result {
                Ok(acquired) => {
                    completed += 1;
                    datasets
                        .entry(key.wavelength)
                        .or_default()
                        .insert(key.resolution, acquired);
                }
                Err(e) => {
                    warn!(key = %key, error = %e, "Registry entry failed");
                    failures.push(RegistryFailure {
                        wavelength: key.wavelength,
                        resolution: key.resolution,
                        error: Box::new(e),
                    });
                    if policy == RegistryPolicy::AllOrNothing {
                        return Err(AcquisitionError::PartialRegistryFailure {
                            failures,
                            completed,
                        });
                    }
                }
            }
        }

        info!(
            total,
            completed,
            failed = failures.len(),
            "Registry built"
        );

        Ok(Self {
            time,
            datasets,
            failures,
        })
    }

    pub fn time(&self) -> DateTime<Utc> {
        self.time
    }

    pub fn get(&self, wavelength: u16, resolution: u32) -> Option<&AcquisitionResult> {
        self.datasets.get(&wavelength)?.get(&resolution)
    }

    /// Results for one wavelength, by resolution.
    pub fn wavelength(&self, wavelength: u16) -> Option<&BTreeMap<u32, AcquisitionResult>> {
        self.datasets.get(&wavelength)
    }

    pub fn len(&self) -> usize {
        self.datasets.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All results, ordered by wavelength then resolution.
    pub fn iter(&self) -> impl Iterator<Item = (u16, u32, &AcquisitionResult)> {
        self.datasets.iter().flat_map(|(&wavelength, by_res)| {
            by_res
                .iter()
                .map(move |(&resolution, result)| (wavelength, resolution, result))
        })
    }

    /// Pairs that failed under [`RegistryPolicy::BestEffort`].
    pub fn failures(&self) -> &[RegistryFailure] {
        &self.failures
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy_is_all_or_nothing() {
        assert_eq!(RegistryPolicy::default(), RegistryPolicy::AllOrNothing);
    }

    #[test]
    fn test_policy_from_yaml() {
        let policy: RegistryPolicy = serde_yaml::from_str("best_effort").unwrap();
        assert_eq!(policy, RegistryPolicy::BestEffort);
    }

    #[test]
    fn test_failure_display() {
        let failure = RegistryFailure {
            wavelength: 193,
            resolution: 1024,
            error: Box::new(AcquisitionError::InvalidConfig("bad".to_string())),
        };
        assert_eq!(
            failure.to_string(),
            "193A/1024px: Invalid configuration: bad"
        );
    }
}

//! Tech profiles: modulation and coding schemes per radio generation.
//!
//! A profile fixes the MCS table (PHY rate + SINR decode threshold per
//! index) and the largest frame the radio will serialize. Profiles are
//! compiled in and selected by name from the scenario file.

use crate::sim::SimTime;

/// One modulation-and-coding entry.
#[derive(Debug, Clone, Copy)]
pub struct Mcs {
    pub rate_bps: u64,
    pub sinr_threshold_db: f64,
}

#[derive(Debug)]
pub struct TechProfile {
    pub name: &'static str,
    pub mcs: &'static [Mcs],
    pub max_packet_bits: u64,
}

static WIFI_11N: TechProfile = TechProfile {
    name: "wifi_11n",
    mcs: &[
        Mcs { rate_bps: 6_500_000, sinr_threshold_db: 10.0 },
        Mcs { rate_bps: 13_000_000, sinr_threshold_db: 15.0 },
        Mcs { rate_bps: 19_500_000, sinr_threshold_db: 20.0 },
        Mcs { rate_bps: 26_000_000, sinr_threshold_db: 25.0 },
    ],
    max_packet_bits: 7_935 * 8,
};

static WIFI_11AC: TechProfile = TechProfile {
    name: "wifi_11ac",
    mcs: &[
        Mcs { rate_bps: 29_300_000, sinr_threshold_db: 10.0 },
        Mcs { rate_bps: 58_500_000, sinr_threshold_db: 15.0 },
        Mcs { rate_bps: 87_800_000, sinr_threshold_db: 20.0 },
        Mcs { rate_bps: 117_000_000, sinr_threshold_db: 25.0 },
    ],
    max_packet_bits: 11_454 * 8,
};

pub fn wifi_11n() -> &'static TechProfile {
    &WIFI_11N
}

pub fn wifi_11ac() -> &'static TechProfile {
    &WIFI_11AC
}

pub fn by_name(name: &str) -> Option<&'static TechProfile> {
    match name {
        "wifi_11n" => Some(&WIFI_11N),
        "wifi_11ac" => Some(&WIFI_11AC),
        _ => None,
    }
}

impl TechProfile {
    fn mcs_at(&self, index: usize) -> &Mcs {
        let idx = index.min(self.mcs.len().saturating_sub(1));
        &self.mcs[idx]
    }

    /// Air-time for `bits` at the given MCS rate: ceil(bits / rate) in nanos.
    pub fn air_time(&self, bits: u64, mcs_index: usize) -> SimTime {
        let rate = self.mcs_at(mcs_index).rate_bps;
        if rate == 0 {
            return SimTime(u64::MAX / 4);
        }
        let nanos = ((bits as u128).saturating_mul(1_000_000_000) + (rate as u128 - 1))
            / rate as u128;
        SimTime(nanos.min(u64::MAX as u128) as u64)
    }

    pub fn sinr_threshold_db(&self, mcs_index: usize) -> f64 {
        self.mcs_at(mcs_index).sinr_threshold_db
    }

    /// Upper bound on any single frame's air-time: the largest frame at the
    /// slowest rate in the table. Used as the inbox garbage-collection horizon.
    pub fn max_air_time(&self) -> SimTime {
        let slowest = self
            .mcs
            .iter()
            .map(|m| m.rate_bps)
            .min()
            .unwrap_or(1)
            .max(1);
        let nanos = ((self.max_packet_bits as u128).saturating_mul(1_000_000_000)
            + (slowest as u128 - 1))
            / slowest as u128;
        SimTime(nanos.min(u64::MAX as u128) as u64)
    }
}

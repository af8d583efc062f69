//! Large-scale fading models.
//!
//! Free-space line-of-sight path loss plus an optional probabilistic-LoS
//! blend for air-to-air links. All powers are linear watts; helpers convert
//! to and from dB where thresholds are specified logarithmically.

use crate::config::SimConfig;
use crate::mobility::Pos;

pub const LIGHT_SPEED: f64 = 3.0e8;

// Probabilistic-LoS constants (suburban air-to-ground fit).
const PLOS_A: f64 = 4.88;
const PLOS_B: f64 = 0.429;
const ETA_LOS_DB: f64 = 0.1;
const ETA_NLOS_DB: f64 = 21.0;

/// Free-space path loss factor: (c / (4π·fc·d))^α, 1.0 at d = 0.
pub fn general_path_loss(distance_m: f64, cfg: &SimConfig) -> f64 {
    if distance_m <= 0.0 {
        return 1.0;
    }
    let lambda_factor =
        LIGHT_SPEED / (4.0 * std::f64::consts::PI * cfg.carrier_frequency_hz * distance_m);
    lambda_factor.powf(cfg.path_loss_exponent)
}

/// Probabilistic-LoS path loss: blend of LoS/NLoS excess losses weighted by
/// the elevation-angle LoS probability 1 / (1 + a·exp(−b·(θ − a))).
pub fn probabilistic_los_path_loss(rx: Pos, tx: Pos, cfg: &SimConfig) -> f64 {
    let distance = rx.dist(tx);
    let horizontal = rx.horizontal_dist(tx);
    let vertical = rx.z.max(tx.z).max(1e-9);

    let elevation_deg = (horizontal / vertical).atan().to_degrees();
    let los_prob = 1.0 / (1.0 + PLOS_A * (-PLOS_B * (elevation_deg - PLOS_A)).exp());
    let nlos_prob = 1.0 - los_prob;

    let base = general_path_loss(distance, cfg);
    // Excess losses are attenuations in dB, so they divide the linear factor.
    let path_loss_los = base / from_db(ETA_LOS_DB);
    let path_loss_nlos = base / from_db(ETA_NLOS_DB);

    los_prob * path_loss_los + nlos_prob * path_loss_nlos
}

/// Linear received power at `rx` for a transmitter at `tx`.
pub fn received_power_w(tx: Pos, rx: Pos, power_w: f64, cfg: &SimConfig, prob_los: bool) -> f64 {
    let loss = if prob_los {
        probabilistic_los_path_loss(rx, tx, cfg)
    } else {
        general_path_loss(rx.dist(tx), cfg)
    };
    power_w * loss
}

/// Closed-form maximum communication range: the distance at which the
/// free-space received power drops to noise · threshold.
pub fn maximum_communication_range(cfg: &SimConfig) -> f64 {
    let tx_db = to_db(cfg.transmit_power_w);
    let noise_db = to_db(cfg.noise_power_w);
    let budget_db = tx_db - noise_db - cfg.sinr_threshold_db();

    LIGHT_SPEED * 10f64.powf(budget_db / (10.0 * cfg.path_loss_exponent))
        / (4.0 * std::f64::consts::PI * cfg.carrier_frequency_hz)
}

pub fn to_db(linear: f64) -> f64 {
    10.0 * linear.log10()
}

pub fn from_db(db: f64) -> f64 {
    10f64.powf(db / 10.0)
}

//! Built-in telemetry catalog
//!
//! Four 16-byte blocks as streamed by the ECU's logging interface. PIDs live
//! in a synthetic `0x8000+` range so they never collide with standard OBD-II
//! PIDs (`0x00`-`0xFF`).

use crate::types::{BlockDef, BlockId, ParameterCategory, ParameterDef};

/// Size of every built-in block in bytes
pub const BLOCK_SIZE: usize = 16;

// =============================================================================
// Conversions
// =============================================================================

fn identity(raw: i64) -> f64 {
    raw as f64
}

fn quarter(raw: i64) -> f64 {
    raw as f64 * 0.25
}

fn half(raw: i64) -> f64 {
    raw as f64 * 0.5
}

fn tenth(raw: i64) -> f64 {
    raw as f64 * 0.1
}

fn hundredth(raw: i64) -> f64 {
    raw as f64 * 0.01
}

fn milli(raw: i64) -> f64 {
    raw as f64 * 0.001
}

fn temperature_offset(raw: i64) -> f64 {
    raw as f64 - 40.0
}

fn percent_of_255(raw: i64) -> f64 {
    raw as f64 * 100.0 / 255.0
}

fn fuel_trim(raw: i64) -> f64 {
    raw as f64 * 100.0 / 128.0
}

fn wideband_afr(raw: i64) -> f64 {
    raw as f64 * 0.02 + 5.0
}

fn o2_voltage(raw: i64) -> f64 {
    raw as f64 * 0.005
}

// =============================================================================
// Engine block
// =============================================================================

const ENGINE_PARAMETERS: &[ParameterDef] = &[
    ParameterDef {
        name: "engine_speed",
        unit: "rpm",
        bit_offset: 0,
        bit_length: 16,
        signed: false,
        convert: quarter,
        category: ParameterCategory::Engine,
        min_value: Some(0.0),
        max_value: Some(9000.0),
        pid: Some(0x8000),
    },
    ParameterDef {
        name: "coolant_temp",
        unit: "°C",
        bit_offset: 16,
        bit_length: 8,
        signed: false,
        convert: temperature_offset,
        category: ParameterCategory::Temperature,
        min_value: Some(-40.0),
        max_value: Some(140.0),
        pid: Some(0x8001),
    },
    ParameterDef {
        name: "intake_air_temp",
        unit: "°C",
        bit_offset: 24,
        bit_length: 8,
        signed: false,
        convert: temperature_offset,
        category: ParameterCategory::Temperature,
        min_value: Some(-40.0),
        max_value: Some(120.0),
        pid: Some(0x8002),
    },
    ParameterDef {
        name: "throttle_position",
        unit: "%",
        bit_offset: 32,
        bit_length: 8,
        signed: false,
        convert: percent_of_255,
        category: ParameterCategory::Engine,
        min_value: Some(0.0),
        max_value: Some(100.0),
        pid: Some(0x8003),
    },
    ParameterDef {
        name: "engine_load",
        unit: "%",
        bit_offset: 40,
        bit_length: 8,
        signed: false,
        convert: percent_of_255,
        category: ParameterCategory::Engine,
        min_value: Some(0.0),
        max_value: Some(100.0),
        pid: Some(0x8004),
    },
    ParameterDef {
        name: "ignition_timing",
        unit: "°BTDC",
        bit_offset: 48,
        bit_length: 8,
        signed: true,
        convert: half,
        category: ParameterCategory::Ignition,
        min_value: Some(-20.0),
        max_value: Some(50.0),
        pid: Some(0x8005),
    },
    ParameterDef {
        name: "knock_sum",
        unit: "count",
        bit_offset: 56,
        bit_length: 6,
        signed: false,
        convert: identity,
        category: ParameterCategory::Ignition,
        min_value: Some(0.0),
        max_value: Some(63.0),
        pid: Some(0x8006),
    },
    ParameterDef {
        name: "check_engine_lamp",
        unit: "",
        bit_offset: 62,
        bit_length: 1,
        signed: false,
        convert: identity,
        category: ParameterCategory::Status,
        min_value: Some(0.0),
        max_value: Some(1.0),
        pid: Some(0x8007),
    },
    ParameterDef {
        name: "closed_loop",
        unit: "",
        bit_offset: 63,
        bit_length: 1,
        signed: false,
        convert: identity,
        category: ParameterCategory::Status,
        min_value: Some(0.0),
        max_value: Some(1.0),
        pid: Some(0x8008),
    },
    ParameterDef {
        name: "vehicle_speed",
        unit: "km/h",
        bit_offset: 64,
        bit_length: 8,
        signed: false,
        convert: identity,
        category: ParameterCategory::Chassis,
        min_value: Some(0.0),
        max_value: Some(255.0),
        pid: Some(0x8009),
    },
    ParameterDef {
        name: "battery_voltage",
        unit: "V",
        bit_offset: 72,
        bit_length: 12,
        signed: false,
        convert: hundredth,
        category: ParameterCategory::Electrical,
        min_value: Some(0.0),
        max_value: Some(18.0),
        pid: Some(0x800A),
    },
    ParameterDef {
        name: "engine_run_time",
        unit: "s",
        bit_offset: 84,
        bit_length: 16,
        signed: false,
        convert: identity,
        category: ParameterCategory::Engine,
        min_value: None,
        max_value: None,
        pid: Some(0x800B),
    },
];

// =============================================================================
// Fuel block
// =============================================================================

const FUEL_PARAMETERS: &[ParameterDef] = &[
    ParameterDef {
        name: "short_term_fuel_trim",
        unit: "%",
        bit_offset: 0,
        bit_length: 8,
        signed: true,
        convert: fuel_trim,
        category: ParameterCategory::Fuel,
        min_value: Some(-25.0),
        max_value: Some(25.0),
        pid: Some(0x8010),
    },
    ParameterDef {
        name: "long_term_fuel_trim",
        unit: "%",
        bit_offset: 8,
        bit_length: 8,
        signed: true,
        convert: fuel_trim,
        category: ParameterCategory::Fuel,
        min_value: Some(-25.0),
        max_value: Some(25.0),
        pid: Some(0x8011),
    },
    ParameterDef {
        name: "injector_pulse_width",
        unit: "ms",
        bit_offset: 16,
        bit_length: 16,
        signed: false,
        convert: milli,
        category: ParameterCategory::Fuel,
        min_value: Some(0.0),
        max_value: Some(30.0),
        pid: Some(0x8012),
    },
    ParameterDef {
        name: "injector_duty",
        unit: "%",
        bit_offset: 32,
        bit_length: 8,
        signed: false,
        convert: percent_of_255,
        category: ParameterCategory::Fuel,
        min_value: Some(0.0),
        max_value: Some(100.0),
        pid: Some(0x8013),
    },
    ParameterDef {
        name: "wideband_afr",
        unit: "AFR",
        bit_offset: 40,
        bit_length: 10,
        signed: false,
        convert: wideband_afr,
        category: ParameterCategory::Fuel,
        min_value: Some(9.0),
        max_value: Some(20.0),
        pid: Some(0x8014),
    },
    ParameterDef {
        name: "fuel_pressure",
        unit: "kPa",
        bit_offset: 50,
        bit_length: 12,
        signed: false,
        convert: tenth,
        category: ParameterCategory::Fuel,
        min_value: Some(0.0),
        max_value: Some(400.0),
        pid: Some(0x8015),
    },
    ParameterDef {
        name: "o2_sensor_voltage",
        unit: "V",
        bit_offset: 64,
        bit_length: 8,
        signed: false,
        convert: o2_voltage,
        category: ParameterCategory::Fuel,
        min_value: Some(0.0),
        max_value: Some(1.275),
        pid: Some(0x8016),
    },
    ParameterDef {
        name: "fuel_level",
        unit: "%",
        bit_offset: 72,
        bit_length: 7,
        signed: false,
        convert: identity,
        category: ParameterCategory::Fuel,
        min_value: Some(0.0),
        max_value: Some(100.0),
        pid: Some(0x8017),
    },
];

// =============================================================================
// Boost block
// =============================================================================

const BOOST_PARAMETERS: &[ParameterDef] = &[
    ParameterDef {
        name: "manifold_pressure",
        unit: "kPa",
        bit_offset: 0,
        bit_length: 16,
        signed: false,
        convert: hundredth,
        category: ParameterCategory::Airflow,
        min_value: Some(0.0),
        max_value: Some(350.0),
        pid: Some(0x8020),
    },
    ParameterDef {
        name: "boost_pressure",
        unit: "psi",
        bit_offset: 16,
        bit_length: 16,
        signed: true,
        convert: hundredth,
        category: ParameterCategory::Airflow,
        min_value: Some(-14.7),
        max_value: Some(35.0),
        pid: Some(0x8021),
    },
    ParameterDef {
        name: "wastegate_duty",
        unit: "%",
        bit_offset: 32,
        bit_length: 8,
        signed: false,
        convert: percent_of_255,
        category: ParameterCategory::Airflow,
        min_value: Some(0.0),
        max_value: Some(100.0),
        pid: Some(0x8022),
    },
    ParameterDef {
        name: "target_boost",
        unit: "psi",
        bit_offset: 40,
        bit_length: 12,
        signed: false,
        convert: hundredth,
        category: ParameterCategory::Airflow,
        min_value: Some(0.0),
        max_value: Some(35.0),
        pid: Some(0x8023),
    },
    ParameterDef {
        name: "mass_airflow",
        unit: "g/s",
        bit_offset: 52,
        bit_length: 16,
        signed: false,
        convert: hundredth,
        category: ParameterCategory::Airflow,
        min_value: Some(0.0),
        max_value: Some(500.0),
        pid: Some(0x8024),
    },
    ParameterDef {
        name: "barometric_pressure",
        unit: "kPa",
        bit_offset: 68,
        bit_length: 8,
        signed: false,
        convert: half,
        category: ParameterCategory::Airflow,
        min_value: Some(50.0),
        max_value: Some(110.0),
        pid: Some(0x8025),
    },
];

// =============================================================================
// Chassis block
// =============================================================================

const CHASSIS_PARAMETERS: &[ParameterDef] = &[
    ParameterDef {
        name: "gear_position",
        unit: "",
        bit_offset: 0,
        bit_length: 3,
        signed: false,
        convert: identity,
        category: ParameterCategory::Chassis,
        min_value: Some(0.0),
        max_value: Some(6.0),
        pid: Some(0x8030),
    },
    ParameterDef {
        name: "clutch_switch",
        unit: "",
        bit_offset: 3,
        bit_length: 1,
        signed: false,
        convert: identity,
        category: ParameterCategory::Status,
        min_value: Some(0.0),
        max_value: Some(1.0),
        pid: Some(0x8031),
    },
    ParameterDef {
        name: "brake_switch",
        unit: "",
        bit_offset: 4,
        bit_length: 1,
        signed: false,
        convert: identity,
        category: ParameterCategory::Status,
        min_value: Some(0.0),
        max_value: Some(1.0),
        pid: Some(0x8032),
    },
    ParameterDef {
        name: "wheel_speed_fl",
        unit: "km/h",
        bit_offset: 8,
        bit_length: 12,
        signed: false,
        convert: tenth,
        category: ParameterCategory::Chassis,
        min_value: Some(0.0),
        max_value: Some(300.0),
        pid: Some(0x8033),
    },
    ParameterDef {
        name: "wheel_speed_fr",
        unit: "km/h",
        bit_offset: 20,
        bit_length: 12,
        signed: false,
        convert: tenth,
        category: ParameterCategory::Chassis,
        min_value: Some(0.0),
        max_value: Some(300.0),
        pid: Some(0x8034),
    },
    ParameterDef {
        name: "wheel_speed_rl",
        unit: "km/h",
        bit_offset: 32,
        bit_length: 12,
        signed: false,
        convert: tenth,
        category: ParameterCategory::Chassis,
        min_value: Some(0.0),
        max_value: Some(300.0),
        pid: Some(0x8035),
    },
    ParameterDef {
        name: "wheel_speed_rr",
        unit: "km/h",
        bit_offset: 44,
        bit_length: 12,
        signed: false,
        convert: tenth,
        category: ParameterCategory::Chassis,
        min_value: Some(0.0),
        max_value: Some(300.0),
        pid: Some(0x8036),
    },
    ParameterDef {
        name: "steering_angle",
        unit: "°",
        bit_offset: 56,
        bit_length: 16,
        signed: true,
        convert: tenth,
        category: ParameterCategory::Chassis,
        min_value: Some(-780.0),
        max_value: Some(780.0),
        pid: Some(0x8037),
    },
    ParameterDef {
        name: "lateral_accel",
        unit: "g",
        bit_offset: 72,
        bit_length: 12,
        signed: true,
        convert: hundredth,
        category: ParameterCategory::Chassis,
        min_value: Some(-2.0),
        max_value: Some(2.0),
        pid: Some(0x8038),
    },
    ParameterDef {
        name: "yaw_rate",
        unit: "°/s",
        bit_offset: 84,
        bit_length: 12,
        signed: true,
        convert: tenth,
        category: ParameterCategory::Chassis,
        min_value: Some(-150.0),
        max_value: Some(150.0),
        pid: Some(0x8039),
    },
];

pub static ENGINE_BLOCK: BlockDef = BlockDef {
    block_id: BlockId::Engine,
    block_size: BLOCK_SIZE,
    parameters: ENGINE_PARAMETERS,
};

pub static FUEL_BLOCK: BlockDef = BlockDef {
    block_id: BlockId::Fuel,
    block_size: BLOCK_SIZE,
    parameters: FUEL_PARAMETERS,
};

pub static BOOST_BLOCK: BlockDef = BlockDef {
    block_id: BlockId::Boost,
    block_size: BLOCK_SIZE,
    parameters: BOOST_PARAMETERS,
};

pub static CHASSIS_BLOCK: BlockDef = BlockDef {
    block_id: BlockId::Chassis,
    block_size: BLOCK_SIZE,
    parameters: CHASSIS_PARAMETERS,
};

/// Every built-in block, in registry order
pub static ALL_BLOCKS: [&BlockDef; 4] = [&ENGINE_BLOCK, &FUEL_BLOCK, &BOOST_BLOCK, &CHASSIS_BLOCK];

/// Resolve a block id to its definition
pub fn block_def(id: BlockId) -> &'static BlockDef {
    match id {
        BlockId::Engine => &ENGINE_BLOCK,
        BlockId::Fuel => &FUEL_BLOCK,
        BlockId::Boost => &BOOST_BLOCK,
        BlockId::Chassis => &CHASSIS_BLOCK,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ParameterRegistry;

    #[test]
    fn test_catalog_is_valid() {
        ParameterRegistry::validate(&ALL_BLOCKS).unwrap();
    }

    #[test]
    fn test_block_def_matches_id() {
        for id in BlockId::ALL {
            assert_eq!(block_def(id).block_id, id);
        }
    }

    #[test]
    fn test_parameters_do_not_overlap() {
        for block in ALL_BLOCKS {
            let mut used = vec![false; block.block_size * 8];
            for p in block.parameters {
                for bit in p.bit_offset..p.bit_end() {
                    assert!(!used[bit], "{}: bit {} reused by {}", block.block_id, bit, p.name);
                    used[bit] = true;
                }
            }
        }
    }

    #[test]
    fn test_pids_stay_out_of_obd_range() {
        for block in ALL_BLOCKS {
            for p in block.parameters {
                assert!(p.pid.unwrap_or(0x8000) >= 0x8000, "{}", p.name);
            }
        }
    }
}

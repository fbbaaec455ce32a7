//! Heat-carrier (water) properties.

use crate::units::{Density, MassRate, VolumeRate};
use uom::si::mass_density::kilogram_per_cubic_meter;
use uom::si::mass_rate::kilogram_per_second;

/// Density of water at 1013 mbar as a function of temperature in °C (kg/m³).
///
/// Linear fit around 4 °C, adequate for 0..130 °C in a closed circuit.
pub fn density_at(temp_c: f64) -> f64 {
    999.972 - 7.0e-3 * (temp_c - 4.0)
}

/// Constant water properties used by both hydraulic and thermal models.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WaterProperties {
    /// Density (kg/m³)
    pub rho: f64,
    /// Specific heat capacity (J/(kg K))
    pub cp: f64,
}

impl WaterProperties {
    pub const CP_DEFAULT: f64 = 4190.0;
    pub const REFERENCE_TEMP_C: f64 = 70.0;

    /// Properties with density evaluated at the given mean network temperature.
    pub fn at_temperature(temp_c: f64) -> Self {
        Self {
            rho: density_at(temp_c),
            cp: Self::CP_DEFAULT,
        }
    }

    pub fn density(&self) -> Density {
        Density::new::<kilogram_per_cubic_meter>(self.rho)
    }

    /// Convert a volumetric flow into a mass flow.
    pub fn mass_flow(&self, flow: VolumeRate) -> MassRate {
        MassRate::new::<kilogram_per_second>(flow.value * self.rho)
    }
}

impl Default for WaterProperties {
    fn default() -> Self {
        Self::at_temperature(Self::REFERENCE_TEMP_C)
    }
}

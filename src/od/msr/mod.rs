/*
    Nyx, blazing fast astrodynamics
    Copyright (C) 2018-onwards Christopher Rabotin <christopher.rabotin@gmail.com>

    This program is free software: you can redistribute it and/or modify
    it under the terms of the GNU Affero General Public License as published
    by the Free Software Foundation, either version 3 of the License, or
    (at your option) any later version.

    This program is distributed in the hope that it will be useful,
    but WITHOUT ANY WARRANTY; without even the implied warranty of
    MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
    GNU Affero General Public License for more details.

    You should have received a copy of the GNU Affero General Public License
    along with this program.  If not, see <https://www.gnu.org/licenses/>.
*/

pub mod adapter;
pub mod model;
pub mod observation;
pub mod trackingdata;
mod types;

pub use adapter::{
    adapter_for, adapters_for, AdapterConfig, MeasurementAdapter, MeasurementData, RangeAdapter,
    RangeRateAdapter,
};
pub use model::MeasurementModel;
pub use observation::ObservationRecord;
pub use trackingdata::{TrackingConfig, TrackingDataArc};
pub use types::MeasurementType;

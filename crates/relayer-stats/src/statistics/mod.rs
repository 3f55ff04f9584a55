// Daily relayer statistics: windows, valuation, registration and totals

pub mod registrar;
pub mod retry_gate;
pub mod totals;
pub mod value;
pub mod window;

pub use registrar::{RegistrationOutcome, RegistrationReport, RelayerObservation, RelayerRegistrar};
pub use retry_gate::RetryGate;
pub use totals::{RelayerTotalsUpdater, TotalsReport};
pub use value::{scaled_amount, PriceIndex, ValueCalculator};
pub use window::{StatisticsWindowRunner, WindowReport};

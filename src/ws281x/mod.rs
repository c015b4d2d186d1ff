mod config;
mod driver;
/// Expands pixel bytes into the PWM symbol stream.
///
/// Every data bit becomes three PWM bits: `110` for a one, `100` for a zero.
/// Both PWM channels consume words from the same FIFO, alternating, so the
/// stream for channel `c` lives in words `c, c + 2, c + 4, ...`.
pub mod encoder;

pub use config::{Ws281xConfig, DEFAULT_DMA_CHANNEL, DEFAULT_GPIO_PIN, DEFAULT_PWM_FREQUENCY};
pub use driver::{StreamEngine, SymbolBuffer, Ws281x};

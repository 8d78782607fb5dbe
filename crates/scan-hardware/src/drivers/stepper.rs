//! Two-motor stepper-controller driver.
//!
//! Protocol overview (rig's stepper controller, half-duplex ASCII):
//! - Request: `[motor][COMMAND];`: motor `1` drives the X lead screw,
//!   motor `2` the Y carriage; a request without a motor prefix addresses
//!   the controller itself.
//! - Response: ASCII terminated by `\r`.
//! - Moves: `SP=<target>` starts an absolute move; the controller converts
//!   user units to counts via its `CON` factor, so targets are sent in user
//!   units rounded to the nearest integer.
//! - Motion status: poll `RS` until the reply contains `RS=0`.
//! - Homing: `SR-` reverse-seeks the home switch, then `AP=0` zeroes the
//!   absolute position register.
//!
//! Both motors share one serial port, so the port lives behind an
//! `Arc<Mutex<..>>` and each [`StepperAxis`] borrows the shared
//! [`StepperController`].

use async_trait::async_trait;
use scan_core::{MotionFault, Movable};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;
use tokio::time::{sleep, timeout, Instant};
use tokio_serial::SerialPortBuilderExt;
use tracing::{debug, info};

/// Anything that can stand in for the controller's serial port.
pub trait SerialPortIO: AsyncRead + AsyncWrite + Unpin + Send {}
impl<T: AsyncRead + AsyncWrite + Unpin + Send> SerialPortIO for T {}

/// Boxed serial port (real port or in-memory test transport).
pub type DynSerial = Box<dyn SerialPortIO>;

/// Connection and timing settings for the stepper controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepperSettings {
    /// Serial device path.
    pub port: String,

    /// Baud rate. The controller speaks 9600 7O1.
    #[serde(default = "default_baud")]
    pub baud: u32,

    /// Deadline for a single command/response transaction.
    #[serde(default = "default_response_timeout", with = "humantime_serde")]
    pub response_timeout: Duration,

    /// Deadline for a commanded move to report complete.
    #[serde(default = "default_move_timeout", with = "humantime_serde")]
    pub move_timeout: Duration,

    /// Interval between `RS` status polls while a move is in flight.
    #[serde(default = "default_poll_interval", with = "humantime_serde")]
    pub poll_interval: Duration,
}

fn default_baud() -> u32 {
    9600
}

fn default_response_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_move_timeout() -> Duration {
    Duration::from_secs(120)
}

fn default_poll_interval() -> Duration {
    Duration::from_millis(100)
}

impl Default for StepperSettings {
    fn default() -> Self {
        Self {
            port: "/dev/ttyUSB0".into(),
            baud: default_baud(),
            response_timeout: default_response_timeout(),
            move_timeout: default_move_timeout(),
            poll_interval: default_poll_interval(),
        }
    }
}

/// Per-motor initialisation sequence, issued once after `ADDR=<motor>`.
///
/// Servo off, control timing and speeds, travel-limit enables, control
/// bits, the user-unit conversion factor, then servo back on.
const MOTOR_SETUP: &[&str] = &[
    "SON=0", "CT=5000", "CS=2000", "AC=1000", "VM=100", "VS=10", "PLS=1", "NLS=1", "CB25=1",
    "CB26=1", "SON=1", "CB3=1", "CB2=1", "CON=26.6667", "CND2=8", "CTM2=7",
];

/// Shared front for the two-motor controller on one serial port.
pub struct StepperController {
    io: Arc<Mutex<DynSerial>>,
    settings: StepperSettings,
}

impl StepperController {
    /// Open the controller's serial port (9600 baud, 7 data bits, odd
    /// parity, 1 stop bit).
    pub fn open(settings: StepperSettings) -> Result<Self, MotionFault> {
        let port = tokio_serial::new(&settings.port, settings.baud)
            .data_bits(tokio_serial::DataBits::Seven)
            .parity(tokio_serial::Parity::Odd)
            .stop_bits(tokio_serial::StopBits::One)
            .open_native_async()
            .map_err(|e| {
                MotionFault::CommunicationLoss(format!("failed to open {}: {e}", settings.port))
            })?;
        info!(port = %settings.port, "connected to stepper controller");
        Ok(Self::from_io(Box::new(port), settings))
    }

    /// Build a controller over an already-open transport (tests use an
    /// in-memory duplex here).
    pub fn from_io(io: DynSerial, settings: StepperSettings) -> Self {
        Self {
            io: Arc::new(Mutex::new(io)),
            settings,
        }
    }

    /// Run the one-time motor setup sequence for both motors, then the
    /// faster X-axis motion profile.
    pub async fn setup(&self) -> Result<(), MotionFault> {
        for motor in [1u8, 2] {
            self.transaction(Some(motor), &format!("ADDR={motor}"))
                .await?;
            for command in MOTOR_SETUP {
                self.transaction(Some(motor), command).await?;
            }
        }
        self.transaction(None, "1AC=5000").await?;
        self.transaction(None, "1VM=200").await?;
        info!("stepper motors configured");
        Ok(())
    }

    /// Home one motor against its reverse switch and zero its position.
    pub async fn home(&self, motor: u8) -> Result<(), MotionFault> {
        info!(motor, "homing");
        self.transaction(Some(motor), "R3=VM").await?;
        self.transaction(Some(motor), "VM=100").await?;
        self.transaction(Some(motor), "SR-").await?;
        self.wait_motion_complete(motor).await?;
        self.transaction(Some(motor), "VM=R3").await?;
        self.transaction(Some(motor), "AP=0").await?;
        Ok(())
    }

    /// Poll `RS` until the motor reports motion-complete.
    async fn wait_motion_complete(&self, motor: u8) -> Result<(), MotionFault> {
        let deadline = Instant::now() + self.settings.move_timeout;
        loop {
            let status = self.transaction(Some(motor), "RS").await?;
            if status.contains("RS=0") {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(MotionFault::Timeout {
                    timeout: self.settings.move_timeout,
                });
            }
            sleep(self.settings.poll_interval).await;
        }
    }

    /// One request/response exchange on the shared port.
    async fn transaction(&self, motor: Option<u8>, command: &str) -> Result<String, MotionFault> {
        let frame = match motor {
            Some(motor) => format!("{motor}{command};"),
            None => format!("{command};"),
        };
        debug!(%frame, "tx");

        let mut io = self.io.lock().await;
        io.write_all(frame.as_bytes())
            .await
            .map_err(|e| MotionFault::CommunicationLoss(e.to_string()))?;
        io.flush()
            .await
            .map_err(|e| MotionFault::CommunicationLoss(e.to_string()))?;

        // Responses are short; read byte-wise until the terminator.
        let mut response = Vec::new();
        let mut byte = [0u8; 1];
        loop {
            let read = timeout(self.settings.response_timeout, io.read(&mut byte))
                .await
                .map_err(|_| MotionFault::Timeout {
                    timeout: self.settings.response_timeout,
                })?
                .map_err(|e| MotionFault::CommunicationLoss(e.to_string()))?;
            if read == 0 {
                return Err(MotionFault::CommunicationLoss(
                    "unexpected EOF from controller".into(),
                ));
            }
            if byte[0] == b'\r' {
                break;
            }
            response.push(byte[0]);
        }

        let response = String::from_utf8_lossy(&response).trim().to_string();
        debug!(%response, "rx");
        Ok(response)
    }
}

/// One motor of the shared controller, exposed as a [`Movable`] axis.
pub struct StepperAxis {
    controller: Arc<StepperController>,
    motor: u8,
}

impl StepperAxis {
    /// Axis front for `motor` (1 = X, 2 = Y).
    pub fn new(controller: Arc<StepperController>, motor: u8) -> Self {
        Self { controller, motor }
    }
}

#[async_trait]
impl Movable for StepperAxis {
    async fn move_abs(&self, position: f64) -> Result<(), MotionFault> {
        let target = position.round() as i64;
        self.controller
            .transaction(Some(self.motor), &format!("SP={target}"))
            .await?;
        Ok(())
    }

    async fn position(&self) -> Result<f64, MotionFault> {
        let reply = self.controller.transaction(Some(self.motor), "AP").await?;
        parse_register(&reply).ok_or_else(|| {
            MotionFault::CommunicationLoss(format!("unparseable position reply '{reply}'"))
        })
    }

    async fn wait_settled(&self) -> Result<(), MotionFault> {
        self.controller.wait_motion_complete(self.motor).await
    }
}

/// Pull the numeric value out of a `KEY=value` style reply.
fn parse_register(reply: &str) -> Option<f64> {
    reply.rsplit('=').next()?.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::DuplexStream;

    fn test_settings() -> StepperSettings {
        StepperSettings {
            response_timeout: Duration::from_secs(1),
            move_timeout: Duration::from_secs(1),
            poll_interval: Duration::from_millis(1),
            ..StepperSettings::default()
        }
    }

    /// Controller stand-in: answers each `;`-terminated request from a
    /// scripted reply table, echoing motion state for `RS` polls.
    async fn run_responder(mut port: DuplexStream, mut busy_polls: usize) {
        let mut buf = Vec::new();
        let mut byte = [0u8; 1];
        loop {
            match port.read(&mut byte).await {
                Ok(0) | Err(_) => return,
                Ok(_) => {}
            }
            if byte[0] != b';' {
                buf.push(byte[0]);
                continue;
            }

            let request = String::from_utf8_lossy(&buf).to_string();
            buf.clear();
            let reply = if request.ends_with("RS") {
                if busy_polls > 0 {
                    busy_polls -= 1;
                    "RS=1".to_string()
                } else {
                    "RS=0".to_string()
                }
            } else if request.ends_with("AP") {
                "AP=42".to_string()
            } else {
                "OK".to_string()
            };
            if port
                .write_all(format!("{reply}\r").as_bytes())
                .await
                .is_err()
            {
                return;
            }
        }
    }

    #[tokio::test]
    async fn test_move_polls_until_complete() {
        let (near, far) = tokio::io::duplex(256);
        tokio::spawn(run_responder(far, 3));

        let controller = Arc::new(StepperController::from_io(Box::new(near), test_settings()));
        let axis = StepperAxis::new(controller, 1);

        axis.move_abs(10.4).await.unwrap();
        axis.wait_settled().await.unwrap();
        assert_eq!(axis.position().await.unwrap(), 42.0);
    }

    #[tokio::test]
    async fn test_setup_and_home_complete() {
        let (near, far) = tokio::io::duplex(1024);
        tokio::spawn(run_responder(far, 0));

        let controller = Arc::new(StepperController::from_io(Box::new(near), test_settings()));
        controller.setup().await.unwrap();
        controller.home(1).await.unwrap();
    }

    #[tokio::test]
    async fn test_silent_controller_times_out() {
        // Keep the far end alive but mute so reads pend until the deadline.
        let (near, _far) = tokio::io::duplex(256);
        let controller = StepperController::from_io(
            Box::new(near),
            StepperSettings {
                response_timeout: Duration::from_millis(20),
                ..test_settings()
            },
        );

        let err = controller.transaction(Some(1), "RS").await.unwrap_err();
        assert!(matches!(err, MotionFault::Timeout { .. }));
    }

    #[test]
    fn test_parse_register() {
        assert_eq!(parse_register("AP=42"), Some(42.0));
        assert_eq!(parse_register("1AP=-3.5"), Some(-3.5));
        assert_eq!(parse_register("garbage"), None);
    }
}

// ABOUTME: Collaborator traits for the wearable session and motion input
// ABOUTME: GATT-level discovery and reads live behind these seams, outside this crate
//
// SPDX-License-Identifier: MIT OR Apache-2.0

use async_trait::async_trait;

use crate::errors::ProviderResult;

/// A live wearable connection exposed by the device-discovery collaborator
///
/// Protocol-level scanning, connection, and GATT reads happen outside this
/// crate; the acquisition engine only asks whether a session is active and
/// for the current sample.
#[async_trait]
pub trait WearableDevice: Send + Sync {
    /// Whether a device session is currently established
    async fn is_session_active(&self) -> bool;

    /// Read the current heart rate from the connected device
    ///
    /// # Errors
    ///
    /// Returns a provider error when no session is active or the read fails;
    /// the acquisition engine treats any error as "fall to the next tier".
    async fn read_heart_rate(&self) -> ProviderResult<u32>;
}

/// Accelerometer sample source driving the motion-based simulator
#[async_trait]
pub trait MotionSource: Send + Sync {
    /// Latest acceleration magnitude in g, or `None` when motion input
    /// is unavailable (the simulator then falls back to its time-driven
    /// mode)
    async fn acceleration_magnitude(&self) -> Option<f64>;
}

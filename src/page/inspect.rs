//! One-shot inspection tasks: dialogs, devices, system and storage.

use serde::Deserialize;
use tracing::debug;

use crate::error::Result;

use super::Page;
use super::runtime::json_string;

// ============================================================================
// Types
// ============================================================================

/// A media input or output device.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaDevice {
    /// `audioinput`, `audiooutput` or `videoinput`.
    pub kind: String,
    /// Human-readable label; empty without media permission.
    #[serde(default)]
    pub label: String,
    /// Device identifier.
    #[serde(default)]
    pub device_id: String,
    /// Group identifier shared by devices of one physical unit.
    #[serde(default)]
    pub group_id: String,
}

/// Host information visible to the page.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemInfo {
    /// Approximate device memory in GiB.
    #[serde(default)]
    pub device_memory: Option<f64>,
    /// Logical CPU cores.
    #[serde(default)]
    pub hardware_concurrency: Option<u32>,
    /// User agent string.
    #[serde(default)]
    pub user_agent: String,
    /// Network connection details.
    #[serde(default)]
    pub network: Option<ConnectionInfo>,
    /// Battery status.
    #[serde(default)]
    pub battery: Option<BatteryInfo>,
}

/// Network connection details.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionInfo {
    /// Downlink estimate in Mbps.
    #[serde(default)]
    pub downlink: Option<f64>,
    /// Effective connection type (`4g`, `3g`, ...).
    #[serde(default)]
    pub effective_type: Option<String>,
    /// Round-trip time estimate in ms.
    #[serde(default)]
    pub rtt: Option<f64>,
    /// Whether data saver is on.
    #[serde(default)]
    pub save_data: Option<bool>,
}

/// Battery status.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatteryInfo {
    /// Whether the battery is charging.
    pub charging: bool,
    /// Seconds until full; `None` when unknown or infinite.
    #[serde(default)]
    pub charging_time: Option<f64>,
    /// Seconds until empty; `None` when unknown or infinite.
    #[serde(default)]
    pub discharging_time: Option<f64>,
    /// Charge level between 0 and 1.
    pub level: f64,
}

/// Web storage and cookies of the page's origin.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageSnapshot {
    /// `localStorage` entries.
    #[serde(default)]
    pub local_storage: Vec<(String, String)>,
    /// `sessionStorage` entries.
    #[serde(default)]
    pub session_storage: Vec<(String, String)>,
    /// Cookies visible to scripts.
    #[serde(default)]
    pub cookies: Vec<(String, String)>,
}

// ============================================================================
// Scripts
// ============================================================================

const MEDIA_DEVICES_SCRIPT: &str = r#"(async () => {
  if (!navigator.mediaDevices || !navigator.mediaDevices.enumerateDevices) return [];
  const devices = await navigator.mediaDevices.enumerateDevices();
  return devices.map(d => ({ kind: d.kind, label: d.label, deviceId: d.deviceId, groupId: d.groupId }));
})()"#;

const SYSTEM_INFO_SCRIPT: &str = r#"(async () => {
  const finite = v => (typeof v === 'number' && isFinite(v)) ? v : null;
  const info = {
    deviceMemory: navigator.deviceMemory ?? null,
    hardwareConcurrency: navigator.hardwareConcurrency ?? null,
    userAgent: navigator.userAgent
  };
  const c = navigator.connection;
  if (c) {
    info.network = { downlink: c.downlink, effectiveType: c.effectiveType, rtt: c.rtt, saveData: c.saveData };
  }
  if (navigator.getBattery) {
    const b = await navigator.getBattery();
    info.battery = {
      charging: b.charging,
      chargingTime: finite(b.chargingTime),
      dischargingTime: finite(b.dischargingTime),
      level: b.level
    };
  }
  return info;
})()"#;

const STORAGE_SCRIPT: &str = r#"(() => {
  const entries = store => { try { return Object.entries(store); } catch (_) { return []; } };
  const cookies = document.cookie
    ? document.cookie.split('; ').map(c => {
        const i = c.indexOf('=');
        return i < 0 ? [c, ''] : [c.slice(0, i), c.slice(i + 1)];
      })
    : [];
  return {
    localStorage: entries(window.localStorage),
    sessionStorage: entries(window.sessionStorage),
    cookies
  };
})()"#;

// ============================================================================
// Page - Inspection
// ============================================================================

impl Page {
    /// Opens an alert dialog in the page.
    ///
    /// The dialog is scheduled rather than opened inline, so the command
    /// returns without waiting for someone to dismiss it.
    pub async fn show_alert(&self, message: &str) -> Result<()> {
        debug!(message_len = message.len(), "Showing alert");

        let expression = format!("setTimeout(() => alert({}), 0)", json_string(message));
        self.evaluate(&expression).await?;
        Ok(())
    }

    /// Lists media devices.
    pub async fn media_devices(&self) -> Result<Vec<MediaDevice>> {
        let devices: Vec<MediaDevice> = self.evaluate_as(MEDIA_DEVICES_SCRIPT).await?;
        debug!(count = devices.len(), "Media devices listed");
        Ok(devices)
    }

    /// Reads host information exposed to the page.
    pub async fn system_info(&self) -> Result<SystemInfo> {
        self.evaluate_as(SYSTEM_INFO_SCRIPT).await
    }

    /// Dumps web storage and cookies.
    pub async fn storage(&self) -> Result<StorageSnapshot> {
        let snapshot: StorageSnapshot = self.evaluate_as(STORAGE_SCRIPT).await?;
        debug!(
            local = snapshot.local_storage.len(),
            session = snapshot.session_storage.len(),
            cookies = snapshot.cookies.len(),
            "Storage read"
        );
        Ok(snapshot)
    }
}

// ============================================================================
// Tests
// ============================================================================

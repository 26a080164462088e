// SPDX-License-Identifier: GPL-3.0-only

//! Device capability prober
//!
//! Lists cameras and reports the permission state without ever failing: a
//! platform that cannot enumerate yields an empty list, one that cannot
//! answer the permission question yields [`PermissionState::Unknown`].

use super::types::{CameraDevice, DeviceKind, PermissionState};
use super::MediaDevices;
use futures::StreamExt;
use futures::stream::BoxStream;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info};

/// Read-only view of the platform's cameras
#[derive(Clone)]
pub struct DeviceProber {
    devices: Arc<dyn MediaDevices>,
    published: Arc<watch::Sender<Vec<CameraDevice>>>,
}

impl DeviceProber {
    pub fn new(devices: Arc<dyn MediaDevices>) -> Self {
        let (published, _) = watch::channel(Vec::new());
        Self {
            devices,
            published: Arc::new(published),
        }
    }

    /// List video input devices
    pub async fn list_cameras(&self) -> Vec<CameraDevice> {
        if !self.devices.is_supported() {
            debug!(platform = self.devices.name(), "Camera API not present");
            return Vec::new();
        }

        match self.devices.enumerate_devices().await {
            Some(devices) => devices
                .into_iter()
                .filter(|d| d.kind == DeviceKind::VideoInput)
                .collect(),
            None => {
                debug!(
                    platform = self.devices.name(),
                    "Device enumeration unsupported"
                );
                Vec::new()
            }
        }
    }

    /// Query the camera permission
    pub async fn query_permission(&self) -> PermissionState {
        if !self.devices.is_supported() {
            return PermissionState::Unknown;
        }
        self.devices
            .query_permission()
            .await
            .unwrap_or(PermissionState::Unknown)
    }

    /// Re-list cameras and publish the result to subscribers
    pub async fn refresh(&self) -> Vec<CameraDevice> {
        let cameras = self.list_cameras().await;
        info!(count = cameras.len(), "Camera list refreshed");
        self.published.send_replace(cameras.clone());
        cameras
    }

    /// Subscribe to published camera lists
    pub fn subscribe(&self) -> watch::Receiver<Vec<CameraDevice>> {
        self.published.subscribe()
    }

    /// Refreshed camera lists, one per platform topology change
    ///
    /// Never yields on platforms without change notifications.
    pub fn topology_updates(&self) -> BoxStream<'static, Vec<CameraDevice>> {
        let Some(mut changes) = self.devices.device_changes() else {
            return futures::stream::pending().boxed();
        };

        let prober = self.clone();
        async_stream::stream! {
            while changes.next().await.is_some() {
                debug!("Device topology changed");
                yield prober.refresh().await;
            }
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::camera::Facing;
    use crate::backends::virtual_camera::VirtualDevices;

    #[tokio::test]
    async fn test_unsupported_platform_degrades() {
        let prober = DeviceProber::new(Arc::new(VirtualDevices::unsupported()));
        assert!(prober.list_cameras().await.is_empty());
        assert_eq!(prober.query_permission().await, PermissionState::Unknown);
    }

    #[tokio::test]
    async fn test_enumeration_unsupported() {
        let devices = VirtualDevices::front_and_rear().without_enumeration();
        let prober = DeviceProber::new(Arc::new(devices));
        assert!(prober.list_cameras().await.is_empty());
    }

    #[tokio::test]
    async fn test_permission_query_unsupported_is_unknown() {
        let devices = VirtualDevices::front_only()
            .with_permission(PermissionState::Denied)
            .without_permission_query();
        let prober = DeviceProber::new(Arc::new(devices));
        assert_eq!(prober.query_permission().await, PermissionState::Unknown);
        assert_eq!(prober.list_cameras().await.len(), 1);
    }

    #[tokio::test]
    async fn test_lists_cameras_and_permission() {
        let devices = VirtualDevices::front_and_rear().with_permission(PermissionState::Prompt);
        let prober = DeviceProber::new(Arc::new(devices));

        let cameras = prober.list_cameras().await;
        assert_eq!(cameras.len(), 2);
        assert_eq!(cameras[0].facing, Some(Facing::User));
        assert_eq!(prober.query_permission().await, PermissionState::Prompt);
    }

    #[tokio::test]
    async fn test_topology_change_publishes() {
        let devices = VirtualDevices::front_only();
        let prober = DeviceProber::new(Arc::new(devices.clone()));
        let mut updates = prober.topology_updates();
        let subscriber = prober.subscribe();

        devices.add_camera("USB Webcam", None);

        let cameras = updates.next().await.unwrap_or_default();
        assert_eq!(cameras.len(), 2);
        assert_eq!(subscriber.borrow().len(), 2);
    }

    #[tokio::test]
    async fn test_unplug_publishes_shorter_list() {
        let devices = VirtualDevices::front_and_rear();
        let prober = DeviceProber::new(Arc::new(devices.clone()));
        let mut updates = prober.topology_updates();

        devices.remove_camera("virtual-1");

        let cameras = updates.next().await.unwrap_or_default();
        assert_eq!(cameras.len(), 1);
        assert_eq!(cameras[0].facing, Some(Facing::User));
    }
}

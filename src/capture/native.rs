//! Native camera access through nokhwa.
//!
//! nokhwa's camera handle blocks on every read, so each stream lives on
//! its own worker thread and the event thread exchanges messages with
//! it.

use super::{BackendError, CameraBackend, Device, Facing, StreamConstraints, VideoStream};
use async_trait::async_trait;
use image::RgbImage;
use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{
    ApiBackend, CameraFormat, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType,
    Resolution,
};
use nokhwa::NokhwaError;
use std::cell::Cell;
use std::sync::mpsc;
use tokio::sync::oneshot;

/// Camera platform backed by the host's native capture API.
#[derive(Debug, Default)]
pub struct NokhwaBackend;

impl NokhwaBackend {
    pub fn new() -> Self {
        Self
    }
}

fn query_devices() -> Result<Vec<Device>, BackendError> {
    let cameras = nokhwa::query(ApiBackend::Auto).map_err(map_error)?;
    Ok(cameras
        .iter()
        .map(|info| Device::new(info.index().as_string(), info.human_name()))
        .collect())
}

fn map_error(err: NokhwaError) -> BackendError {
    let message = err.to_string();
    if message.to_lowercase().contains("permission") {
        BackendError::PermissionDenied
    } else {
        BackendError::Unavailable(message)
    }
}

fn parse_index(id: &str) -> CameraIndex {
    match id.parse::<u32>() {
        Ok(index) => CameraIndex::Index(index),
        Err(_) => CameraIndex::String(id.to_owned()),
    }
}

#[async_trait(?Send)]
impl CameraBackend for NokhwaBackend {
    async fn video_inputs(&self) -> Result<Vec<Device>, BackendError> {
        tokio::task::spawn_blocking(query_devices)
            .await
            .map_err(|e| BackendError::Unavailable(e.to_string()))?
    }

    async fn acquire(
        &self,
        constraints: &StreamConstraints,
    ) -> Result<Box<dyn VideoStream>, BackendError> {
        let device_id = match constraints.device_id {
            Some(ref id) => id.clone(),
            None => {
                // Desktop platforms rarely report facing; fall back to the label heuristic
                let devices = self.video_inputs().await?;
                let preferred = match constraints.facing {
                    Facing::Environment => devices.iter().find(|d| d.is_rear_facing()),
                    Facing::User => devices.iter().find(|d| !d.is_rear_facing()),
                };
                preferred
                    .or_else(|| devices.first())
                    .map(|d| d.id().to_owned())
                    .ok_or_else(|| BackendError::NotFound("no video inputs".into()))?
            }
        };

        let (ready_tx, ready_rx) = oneshot::channel();
        let (command_tx, command_rx) = mpsc::channel();
        let index = parse_index(&device_id);
        let resolution = Resolution::new(constraints.ideal_width, constraints.ideal_height);

        std::thread::Builder::new()
            .name(format!("camera-{}", device_id))
            .spawn(move || run_worker(index, resolution, ready_tx, command_rx))
            .map_err(|e| BackendError::Unavailable(e.to_string()))?;

        ready_rx.await.map_err(|_| BackendError::Closed)??;
        tracing::info!(%device_id, "Native camera stream opened");

        Ok(Box::new(NokhwaStream {
            device_id,
            commands: command_tx,
            released: Cell::new(false),
        }))
    }
}

enum Command {
    Grab(oneshot::Sender<Result<RgbImage, BackendError>>),
    Stop,
}

fn run_worker(
    index: CameraIndex,
    resolution: Resolution,
    ready: oneshot::Sender<Result<(), BackendError>>,
    commands: mpsc::Receiver<Command>,
) {
    let format = RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(
        CameraFormat::new(resolution, FrameFormat::MJPEG, 30),
    ));

    let mut camera = match nokhwa::Camera::new(index, format) {
        Ok(camera) => camera,
        Err(e) => {
            let _ = ready.send(Err(map_error(e)));
            return;
        }
    };
    if let Err(e) = camera.open_stream() {
        let _ = ready.send(Err(map_error(e)));
        return;
    }
    if ready.send(Ok(())).is_err() {
        // Requester went away before the stream opened
        let _ = camera.stop_stream();
        return;
    }

    while let Ok(command) = commands.recv() {
        match command {
            Command::Grab(reply) => {
                let frame = camera
                    .frame()
                    .and_then(|buffer| buffer.decode_image::<RgbFormat>())
                    .map_err(map_error)
                    .and_then(|decoded| {
                        let (width, height) = (decoded.width(), decoded.height());
                        RgbImage::from_raw(width, height, decoded.into_raw()).ok_or_else(|| {
                            BackendError::Unavailable("decoded frame size mismatch".into())
                        })
                    });
                let _ = reply.send(frame);
            }
            Command::Stop => break,
        }
    }

    if let Err(e) = camera.stop_stream() {
        tracing::warn!(error = %e, "Failed to stop native camera stream");
    }
}

struct NokhwaStream {
    device_id: String,
    commands: mpsc::Sender<Command>,
    released: Cell<bool>,
}

#[async_trait(?Send)]
impl VideoStream for NokhwaStream {
    fn device_id(&self) -> &str {
        &self.device_id
    }

    async fn grab(&self) -> Result<RgbImage, BackendError> {
        if self.released.get() {
            return Err(BackendError::Closed);
        }
        let (reply_tx, reply_rx) = oneshot::channel();
        self.commands
            .send(Command::Grab(reply_tx))
            .map_err(|_| BackendError::Closed)?;
        reply_rx.await.map_err(|_| BackendError::Closed)?
    }

    fn release(&self) {
        if !self.released.replace(true) {
            let _ = self.commands.send(Command::Stop);
        }
    }

    fn is_live(&self) -> bool {
        !self.released.get()
    }
}

impl Drop for NokhwaStream {
    fn drop(&mut self) {
        self.release();
    }
}

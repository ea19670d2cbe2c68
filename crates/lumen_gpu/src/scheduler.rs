//! Multi-device wavefront driver.
//!
//! Every device walks the same validated stage chain on its own thread;
//! devices never wait on each other until the frame is drained.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use crate::device::{ComputeDevice, DeviceOutput};
use crate::error::{GpuError, GpuResult};
use crate::graph::{Stage, StageGraph};

/// Shared flag that stops a frame at the next iteration boundary.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    /// Clear the flag so the token can stop another frame.
    pub fn reset(&self) {
        self.0.store(false, Ordering::Relaxed);
    }
}

/// Drive `graph` on every device in parallel and drain the accumulators.
///
/// Outputs come back in device order. A cancelled frame still drains, so
/// callers get the samples completed so far.
pub fn run_wavefront(
    devices: Vec<Box<dyn ComputeDevice>>,
    graph: &StageGraph,
    cancel: Option<&CancelToken>,
) -> GpuResult<Vec<DeviceOutput>> {
    if devices.is_empty() {
        return Err(GpuError::NoDevices);
    }
    let order = graph.validate()?;
    let start = Instant::now();

    let results: Vec<GpuResult<DeviceOutput>> = thread::scope(|scope| {
        let handles: Vec<_> = devices
            .into_iter()
            .map(|device| {
                let name = device.name().to_string();
                let handle = scope.spawn(|| drive(device, &order, cancel));
                (name, handle)
            })
            .collect();

        handles
            .into_iter()
            .map(|(name, handle)| handle.join().unwrap_or_else(|_| Err(GpuError::DeviceThread(name))))
            .collect()
    });

    let outputs = results.into_iter().collect::<GpuResult<Vec<_>>>()?;
    let samples: u64 = outputs.iter().map(DeviceOutput::total_samples).sum();
    log::info!(
        "Wavefront: {} stages on {} devices, {} samples in {:.2?}",
        order.len(),
        outputs.len(),
        samples,
        start.elapsed()
    );
    Ok(outputs)
}

fn drive(
    mut device: Box<dyn ComputeDevice>,
    order: &[Stage],
    cancel: Option<&CancelToken>,
) -> GpuResult<DeviceOutput> {
    for &stage in order {
        if stage == Stage::Collect && cancel.is_some_and(CancelToken::is_cancelled) {
            log::info!("{}: frame cancelled", device.name());
            break;
        }
        device.dispatch(stage)?;
    }
    let output = device.drain()?;
    log::debug!("{}: drained {} samples", device.name(), output.total_samples());
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Records dispatches and reports one sample per bounce.
    struct Recorder {
        name: String,
        log: Arc<Mutex<Vec<Stage>>>,
        bounces: u32,
        cancel_after: Option<(usize, CancelToken)>,
    }

    impl Recorder {
        fn new(name: &str) -> (Self, Arc<Mutex<Vec<Stage>>>) {
            let log = Arc::new(Mutex::new(Vec::new()));
            let recorder = Self {
                name: name.to_string(),
                log: Arc::clone(&log),
                bounces: 0,
                cancel_after: None,
            };
            (recorder, log)
        }
    }

    impl ComputeDevice for Recorder {
        fn name(&self) -> &str {
            &self.name
        }

        fn dispatch(&mut self, stage: Stage) -> GpuResult<()> {
            let mut log = self.log.lock().unwrap();
            log.push(stage);
            if stage == Stage::Bounce {
                self.bounces += 1;
            }
            if let Some((after, token)) = &self.cancel_after {
                if log.len() == *after {
                    token.cancel();
                }
            }
            Ok(())
        }

        fn drain(&mut self) -> GpuResult<DeviceOutput> {
            Ok(DeviceOutput {
                output: vec![lumen_math::Vec3::ONE * self.bounces as f32],
                counts: vec![self.bounces],
            })
        }
    }

    struct Failing;

    impl ComputeDevice for Failing {
        fn name(&self) -> &str {
            "failing"
        }

        fn dispatch(&mut self, stage: Stage) -> GpuResult<()> {
            Err(GpuError::Readback(format!("{stage} failed")))
        }

        fn drain(&mut self) -> GpuResult<DeviceOutput> {
            Ok(DeviceOutput::default())
        }
    }

    #[test]
    fn test_every_device_runs_the_chain_in_order() {
        let (a, log_a) = Recorder::new("a");
        let (b, log_b) = Recorder::new("b");
        let graph = StageGraph::wavefront(3);

        let outputs = run_wavefront(vec![Box::new(a), Box::new(b)], &graph, None).unwrap();

        let expected: Vec<Stage> = (0..3).flat_map(|_| Stage::ALL).collect();
        assert_eq!(*log_a.lock().unwrap(), expected);
        assert_eq!(*log_b.lock().unwrap(), expected);
        assert_eq!(outputs.len(), 2);
        assert_eq!(outputs[0].counts, vec![3]);
    }

    #[test]
    fn test_cancel_stops_at_iteration_boundary() {
        let token = CancelToken::new();
        let (mut a, log) = Recorder::new("a");
        // Cancel in the middle of the second iteration
        a.cancel_after = Some((6, token.clone()));

        let outputs = run_wavefront(vec![Box::new(a)], &StageGraph::wavefront(10), Some(&token)).unwrap();

        assert_eq!(log.lock().unwrap().len(), 8);
        assert_eq!(outputs[0].counts, vec![2]);
        assert!(token.is_cancelled());
        token.reset();
        assert!(!token.is_cancelled());
    }

    #[test]
    fn test_device_error_propagates() {
        let (a, _) = Recorder::new("a");
        let err = run_wavefront(vec![Box::new(a), Box::new(Failing)], &StageGraph::wavefront(1), None)
            .unwrap_err();
        assert!(matches!(err, GpuError::Readback(_)));
    }

    #[test]
    fn test_rejects_invalid_graph_and_empty_device_list() {
        let (a, log) = Recorder::new("a");
        let mut nodes = StageGraph::wavefront(1).nodes().to_vec();
        nodes.swap(1, 2);
        let bad = StageGraph::from_nodes(nodes);
        assert!(matches!(
            run_wavefront(vec![Box::new(a)], &bad, None),
            Err(GpuError::Schedule(_))
        ));
        assert!(log.lock().unwrap().is_empty());

        assert!(matches!(
            run_wavefront(Vec::new(), &StageGraph::wavefront(1), None),
            Err(GpuError::NoDevices)
        ));
    }
}

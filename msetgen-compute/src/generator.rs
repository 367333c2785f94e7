//! Block driver: turns a `MapSectionRequest` into a `MapSectionResponse`.

use crate::block_state::BlockIterationState;
use crate::cancellation::{CancellationSignal, NeverCancel};
use crate::iterator::SamplePointIterator;
use crate::limb_buffer::LimbBuffer;
use log::{debug, warn};
use msetgen_core::{
    FixedPointFormat, GeneratorConfig, MapSectionError, MapSectionRequest, MapSectionResponse,
    SamplePoints,
};
use std::time::Instant;

/// Working Z buffers for the lane-group being iterated.
struct ScratchArena {
    zr: LimbBuffer,
    zi: LimbBuffer,
}

impl ScratchArena {
    fn new(limb_count: usize) -> Self {
        Self {
            zr: LimbBuffer::new(limb_count),
            zi: LimbBuffer::new(limb_count),
        }
    }
}

/// Arithmetic and scratch storage for one fixed-point format.
struct BlockEngine {
    format: FixedPointFormat,
    iterator: SamplePointIterator,
    arena: ScratchArena,
}

impl BlockEngine {
    fn new(format: FixedPointFormat, threshold: u32) -> Result<Self, MapSectionError> {
        Ok(Self {
            format,
            iterator: SamplePointIterator::new(format, threshold)?,
            arena: ScratchArena::new(format.limb_count),
        })
    }
}

/// Computes Mandelbrot blocks one request at a time.
///
/// The engine is kept between requests and rebuilt only when the format
/// changes, so a worker computing many blocks at one zoom level allocates
/// its scratch buffers once.
pub struct MapSectionGenerator {
    config: GeneratorConfig,
    engine: Option<BlockEngine>,
}

impl MapSectionGenerator {
    pub fn new(config: GeneratorConfig) -> Self {
        Self {
            config,
            engine: None,
        }
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// Format of the cached engine, if any request has run yet.
    pub fn current_format(&self) -> Option<FixedPointFormat> {
        self.engine.as_ref().map(|engine| engine.format)
    }

    pub fn generate(
        &mut self,
        request: &MapSectionRequest,
    ) -> Result<MapSectionResponse, MapSectionError> {
        self.generate_with_cancellation(request, &NeverCancel)
    }

    /// Compute a block, polling `cancel` before each row that still needs work.
    ///
    /// A cancelled request still returns `Ok`: rows finished before the
    /// signal are complete, later rows keep their previous (or zero) values,
    /// and `request_completed` is false. A signal raised once no rows remain
    /// is never observed.
    pub fn generate_with_cancellation<C: CancellationSignal>(
        &mut self,
        request: &MapSectionRequest,
        cancel: &C,
    ) -> Result<MapSectionResponse, MapSectionError> {
        request.validate()?;
        let started = Instant::now();
        let format = request.format;
        let block_size = request.block_size;

        let previous = match &request.previous {
            Some(previous) if previous.format != format => {
                warn!(
                    "Discarding previous values computed with {:?}; request uses {:?}",
                    previous.format, format
                );
                None
            }
            Some(previous) => Some(previous.clone()),
            None => None,
        };
        let resuming = previous.is_some();
        let collect_math_op_counts = self.config.collect_math_op_counts;

        let sample_points = SamplePoints::build(
            &request.position,
            &request.sample_spacing,
            block_size,
            format,
        )?;

        let engine = self.engine_for(format, request.threshold)?;
        engine.iterator.set_threshold(request.threshold)?;
        engine.iterator.reset_op_counts();
        let BlockEngine {
            iterator, arena, ..
        } = engine;

        debug!(
            "Generating {}x{} block: {} limbs, target {}, threshold {}{}",
            block_size.width,
            block_size.height,
            format.limb_count,
            request.target_iterations,
            request.threshold,
            if resuming { ", resuming" } else { "" }
        );

        let mut state = BlockIterationState::new(
            format,
            block_size,
            request.target_iterations,
            &sample_points,
            previous,
        );

        let mut request_completed = true;
        let mut in_play = Vec::with_capacity(block_size.vectors_per_row());
        while state.next_pending_row().is_some() {
            if cancel.is_cancelled() {
                request_completed = false;
                break;
            }
            let Some(_row) = state.get_next_row_number() else {
                break;
            };

            let resumed = state.is_row_resumed();
            in_play.clear();
            in_play.extend_from_slice(state.in_play_list());

            for &group in &in_play {
                state.load_lane_group(group, &mut arena.zr, &mut arena.zi);
                let escaped = iterator.iterate_first_round(
                    state.cr(group),
                    state.ci(),
                    &mut arena.zr,
                    &mut arena.zi,
                    resumed,
                );
                let mut done =
                    state.update_lane_group(group, escaped, &arena.zr, &arena.zi, !resumed);

                while !done {
                    let escaped =
                        iterator.iterate(state.cr(group), state.ci(), &mut arena.zr, &mut arena.zi);
                    done = state.update_lane_group(group, escaped, &arena.zr, &arena.zi, true);
                }
            }
        }

        let (values, all_rows_have_escaped) = state.finish();
        let math_op_counts = collect_math_op_counts.then(|| iterator.math_op_counts());

        if request_completed {
            debug!(
                "Block done in {:.1}ms: {} of {} escaped",
                started.elapsed().as_secs_f64() * 1000.0,
                values.escaped.iter().filter(|&&e| e).count(),
                block_size.pixel_count()
            );
        } else {
            debug!(
                "Block cancelled after {:.1}ms",
                started.elapsed().as_secs_f64() * 1000.0
            );
        }

        Ok(MapSectionResponse {
            block_size,
            values,
            request_completed,
            all_rows_have_escaped,
            math_op_counts,
        })
    }

    fn engine_for(
        &mut self,
        format: FixedPointFormat,
        threshold: u32,
    ) -> Result<&mut BlockEngine, MapSectionError> {
        let engine = match self.engine.take() {
            Some(engine) if engine.format == format => engine,
            _ => {
                debug!(
                    "Building engine for {} limbs, {} integer bits",
                    format.limb_count, format.bits_before_binary_point
                );
                BlockEngine::new(format, threshold)?
            }
        };
        Ok(self.engine.insert(engine))
    }
}

impl Default for MapSectionGenerator {
    fn default() -> Self {
        Self::new(GeneratorConfig::default())
    }
}

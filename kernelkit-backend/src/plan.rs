//! Dispatch planning.
//!
//! Maps an iteration domain onto a thread-group shape and a grid of
//! thread-groups. Two modes:
//!
//! - **inferred**: no thread extents given. The problem is treated as 1D with
//!   `N = max(buffer byte sizes)` (or an explicit `iters`), spread over
//!   `ceil(N / W)` groups of `W x H` threads.
//! - **explicit**: at least two extents `(a, b)` given. The grid is `(a, b, 1)`
//!   as-is; each group still has `W x H` threads.
//!
//! In both modes `W` is the preferred group width and
//! `H = max(1, max_threads_per_group / W)`. Kernels must bounds-check, since
//! trailing groups cover more invocations than the problem needs.

/// Errors raised while planning. All of them happen before any device call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlanError {
    #[error("explicit dispatch needs at least 2 thread extents, got {given}")]
    TooFewAxes { given: usize },
    #[error("thread extent on axis {axis} is zero")]
    ZeroExtent { axis: usize },
    #[error("grid axis {axis} needs {groups} groups, device allows {max}")]
    GridTooLarge { axis: usize, groups: u64, max: u32 },
    #[error("invalid device limits: {0}")]
    InvalidLimits(&'static str),
}

/// Width, height and depth of a group or grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Extent3 {
    pub width: u32,
    pub height: u32,
    pub depth: u32,
}

impl Extent3 {
    pub const fn new(width: u32, height: u32, depth: u32) -> Self {
        Self {
            width,
            height,
            depth,
        }
    }

    /// Total number of cells.
    pub fn volume(&self) -> u64 {
        self.width as u64 * self.height as u64 * self.depth as u64
    }
}

impl std::fmt::Display for Extent3 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}x{}", self.width, self.height, self.depth)
    }
}

/// Device limits the planner respects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceLimits {
    max_threads_per_group: u32,
    preferred_group_width: u32,
    max_groups_per_dimension: u32,
}

impl DeviceLimits {
    pub fn new(
        max_threads_per_group: u32,
        preferred_group_width: u32,
        max_groups_per_dimension: u32,
    ) -> Result<Self, PlanError> {
        if max_threads_per_group == 0 {
            return Err(PlanError::InvalidLimits("max threads per group is zero"));
        }
        if preferred_group_width == 0 {
            return Err(PlanError::InvalidLimits("preferred group width is zero"));
        }
        if preferred_group_width > max_threads_per_group {
            return Err(PlanError::InvalidLimits(
                "preferred group width exceeds max threads per group",
            ));
        }
        if max_groups_per_dimension == 0 {
            return Err(PlanError::InvalidLimits("max groups per dimension is zero"));
        }
        Ok(Self {
            max_threads_per_group,
            preferred_group_width,
            max_groups_per_dimension,
        })
    }

    /// Reads the compute limits of a `wgpu` device.
    ///
    /// `wgpu` reports no SIMD execution width, so the preferred width is supplied
    /// by the caller.
    pub fn from_wgpu(limits: &wgpu::Limits, preferred_group_width: u32) -> Result<Self, PlanError> {
        Self::new(
            limits.max_compute_invocations_per_workgroup,
            preferred_group_width,
            limits.max_compute_workgroups_per_dimension,
        )
    }

    pub fn max_threads_per_group(&self) -> u32 {
        self.max_threads_per_group
    }

    pub fn preferred_group_width(&self) -> u32 {
        self.preferred_group_width
    }

    pub fn max_groups_per_dimension(&self) -> u32 {
        self.max_groups_per_dimension
    }

    /// `(W, H, 1)` with `H` floored and at least 1.
    pub fn group_shape(&self) -> Extent3 {
        let w = self.preferred_group_width;
        let h = (self.max_threads_per_group / w).max(1);
        Extent3::new(w, h, 1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchMode {
    /// 1D problem of `iterations` cells, sized from the buffers or `iters`.
    Inferred { iterations: u64 },
    Explicit,
}

/// Chosen group and grid shape for one kernel invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchPlan {
    pub group: Extent3,
    pub grid: Extent3,
    pub mode: DispatchMode,
}

impl DispatchPlan {
    /// Invocations the device will launch.
    pub fn total_threads(&self) -> u64 {
        self.group.volume() * self.grid.volume()
    }
}

/// Checks an explicit thread request without looking at the device.
pub fn validate_threads(threads: &[u32]) -> Result<(), PlanError> {
    if threads.len() < 2 {
        return Err(PlanError::TooFewAxes {
            given: threads.len(),
        });
    }
    if let Some(axis) = threads.iter().position(|&t| t == 0) {
        return Err(PlanError::ZeroExtent { axis });
    }
    Ok(())
}

/// Plans a dispatch.
///
/// `threads` selects the mode; `buffer_sizes` and `iters` only matter in
/// inferred mode.
pub fn plan_dispatch(
    limits: &DeviceLimits,
    threads: Option<&[u32]>,
    buffer_sizes: &[u64],
    iters: Option<u64>,
) -> Result<DispatchPlan, PlanError> {
    let group = limits.group_shape();

    let (grid, mode) = match threads {
        None => {
            let n = iters.unwrap_or_else(|| buffer_sizes.iter().copied().max().unwrap_or(0));
            let w = group.width as u64;
            let groups = n.div_ceil(w).max(1);
            let width = check_axis(limits, 0, groups)?;
            (Extent3::new(width, 1, 1), DispatchMode::Inferred { iterations: n })
        }
        Some(threads) => {
            validate_threads(threads)?;
            if threads.len() > 2 {
                log::debug!("ignoring thread extents beyond the second: {:?}", &threads[2..]);
            }
            let width = check_axis(limits, 0, threads[0] as u64)?;
            let height = check_axis(limits, 1, threads[1] as u64)?;
            (Extent3::new(width, height, 1), DispatchMode::Explicit)
        }
    };

    log::debug!("plan: group={} grid={} mode={:?}", group, grid, mode);
    Ok(DispatchPlan { group, grid, mode })
}

fn check_axis(limits: &DeviceLimits, axis: usize, groups: u64) -> Result<u32, PlanError> {
    let max = limits.max_groups_per_dimension;
    if groups > max as u64 {
        return Err(PlanError::GridTooLarge { axis, groups, max });
    }
    Ok(groups as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limits(width: u32, max_threads: u32) -> DeviceLimits {
        DeviceLimits::new(max_threads, width, 65535).unwrap()
    }

    #[test]
    fn test_inferred_scenario() {
        let plan = plan_dispatch(&limits(32, 256), None, &[1000], None).unwrap();
        assert_eq!(plan.group, Extent3::new(32, 8, 1));
        assert_eq!(plan.grid, Extent3::new(32, 1, 1));
        assert_eq!(plan.mode, DispatchMode::Inferred { iterations: 1000 });
    }

    #[test]
    fn test_inferred_uses_largest_buffer() {
        let plan = plan_dispatch(&limits(32, 256), None, &[64, 4096, 16], None).unwrap();
        assert_eq!(plan.grid.width, 128);
    }

    #[test]
    fn test_inferred_covers_every_iteration() {
        let l = limits(32, 256);
        for n in 1..2000u64 {
            let plan = plan_dispatch(&l, None, &[n], None).unwrap();
            let w = plan.group.width as u64;
            assert!(plan.grid.width as u64 * w >= n, "n={} dropped iterations", n);
            assert!((plan.grid.width as u64 - 1) * w < n, "n={} over-provisioned", n);
        }
    }

    #[test]
    fn test_inferred_empty_still_dispatches_one_group() {
        let plan = plan_dispatch(&limits(32, 256), None, &[], None).unwrap();
        assert_eq!(plan.grid, Extent3::new(1, 1, 1));
        assert_eq!(plan.mode, DispatchMode::Inferred { iterations: 0 });
    }

    #[test]
    fn test_iters_overrides_buffer_sizes() {
        let plan = plan_dispatch(&limits(32, 256), None, &[1_000_000], Some(64)).unwrap();
        assert_eq!(plan.grid.width, 2);
    }

    #[test]
    fn test_explicit_grid_is_not_divided() {
        let plan = plan_dispatch(&limits(32, 256), Some(&[640, 480]), &[12, 1 << 20], None).unwrap();
        assert_eq!(plan.grid, Extent3::new(640, 480, 1));
        assert_eq!(plan.group, Extent3::new(32, 8, 1));
        assert_eq!(plan.mode, DispatchMode::Explicit);
    }

    #[test]
    fn test_explicit_ignores_extra_axes() {
        let plan = plan_dispatch(&limits(32, 256), Some(&[3, 5, 7]), &[], None).unwrap();
        assert_eq!(plan.grid, Extent3::new(3, 5, 1));
    }

    #[test]
    fn test_explicit_needs_two_axes() {
        let l = limits(32, 256);
        assert_eq!(
            plan_dispatch(&l, Some(&[640]), &[], None),
            Err(PlanError::TooFewAxes { given: 1 })
        );
        assert_eq!(
            plan_dispatch(&l, Some(&[]), &[], None),
            Err(PlanError::TooFewAxes { given: 0 })
        );
    }

    #[test]
    fn test_explicit_rejects_zero_extent() {
        assert_eq!(
            plan_dispatch(&limits(32, 256), Some(&[16, 0]), &[], None),
            Err(PlanError::ZeroExtent { axis: 1 })
        );
    }

    #[test]
    fn test_group_height_is_floored_in_both_modes() {
        let l = limits(48, 256);
        let inferred = plan_dispatch(&l, None, &[100], None).unwrap();
        let explicit = plan_dispatch(&l, Some(&[4, 4]), &[], None).unwrap();
        assert_eq!(inferred.group, Extent3::new(48, 5, 1));
        assert_eq!(explicit.group, inferred.group);
    }

    #[test]
    fn test_group_height_at_least_one() {
        let plan = plan_dispatch(&limits(64, 64), None, &[10], None).unwrap();
        assert_eq!(plan.group, Extent3::new(64, 1, 1));
    }

    #[test]
    fn test_grid_too_large() {
        let l = DeviceLimits::new(256, 32, 100).unwrap();
        assert_eq!(
            plan_dispatch(&l, None, &[32 * 101], None),
            Err(PlanError::GridTooLarge {
                axis: 0,
                groups: 101,
                max: 100
            })
        );
        assert!(matches!(
            plan_dispatch(&l, Some(&[10, 200]), &[], None),
            Err(PlanError::GridTooLarge { axis: 1, .. })
        ));
    }

    #[test]
    fn test_huge_iteration_count_is_too_large() {
        let l = DeviceLimits::new(256, 32, 65535).unwrap();
        assert_eq!(
            plan_dispatch(&l, None, &[], Some(u64::MAX)),
            Err(PlanError::GridTooLarge {
                axis: 0,
                groups: u64::MAX.div_ceil(32),
                max: 65535
            })
        );
        let plan = plan_dispatch(&l, None, &[], Some(32 * 65535)).unwrap();
        assert_eq!(plan.grid.width, 65535);
    }

    #[test]
    fn test_invalid_limits() {
        assert!(DeviceLimits::new(0, 32, 10).is_err());
        assert!(DeviceLimits::new(256, 0, 10).is_err());
        assert!(DeviceLimits::new(16, 32, 10).is_err());
        assert!(DeviceLimits::new(256, 32, 0).is_err());
    }

    #[test]
    fn test_from_wgpu_defaults() {
        let l = DeviceLimits::from_wgpu(&wgpu::Limits::default(), 32).unwrap();
        assert_eq!(l.max_threads_per_group(), 256);
        assert_eq!(l.group_shape(), Extent3::new(32, 8, 1));
        assert_eq!(l.max_groups_per_dimension(), 65535);
    }

    #[test]
    fn test_total_threads() {
        let plan = plan_dispatch(&limits(32, 256), Some(&[2, 3]), &[], None).unwrap();
        assert_eq!(plan.total_threads(), 256 * 6);
    }
}

//! WGSL sources of the bundled demo kernels.
//!
//! Every kernel sizes its workgroups from `group_width` / `group_height`, so
//! the planned group shape is what actually runs.

pub const FRACTAL_WGSL: &str = include_str!("kernels/fractal.wgsl");
pub const VORONOI_WGSL: &str = include_str!("kernels/voronoi.wgsl");
pub const MONTE_CARLO_WGSL: &str = include_str!("kernels/monte_carlo.wgsl");
pub const RANDOM_WGSL: &str = include_str!("kernels/random.wgsl");

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::{compute_entries, override_names, specialize, tokenize};
    use crate::plan::Extent3;

    const BUNDLED: [(&str, &str); 4] = [
        (FRACTAL_WGSL, "fractal"),
        (VORONOI_WGSL, "voronoi"),
        (MONTE_CARLO_WGSL, "monte_carlo"),
        (RANDOM_WGSL, "randomf"),
    ];

    fn validate(source: &str) -> Result<naga::valid::ModuleInfo, String> {
        let module = naga::front::wgsl::parse_str(source).map_err(|e| e.emit_to_string(source))?;
        naga::valid::Validator::new(
            naga::valid::ValidationFlags::all(),
            naga::valid::Capabilities::all(),
        )
        .validate(&module)
        .map_err(|e| format!("{:?}", e))
    }

    #[test]
    fn test_bundled_entry_points() {
        for (source, entry) in BUNDLED {
            let tokens = tokenize(source);
            assert_eq!(compute_entries(&tokens), vec![entry]);
            assert_eq!(override_names(&tokens), vec!["group_width", "group_height"]);
        }
    }

    #[test]
    fn test_bundled_kernels_compile_for_planned_groups() {
        for (source, entry) in BUNDLED {
            for group in [Extent3::new(32, 8, 1), Extent3::new(64, 16, 1), Extent3::new(48, 5, 1)] {
                let text = specialize(source, group);
                if let Err(e) = validate(&text) {
                    panic!("{} at group {} failed to compile:\n{}", entry, group, e);
                }
            }
        }
    }
}

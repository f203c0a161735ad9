use std::path::{Path, PathBuf};

use kernelkit_backend::{first_kernel_name, CompileOptions, GpuError, GpuResult, Library, WgpuContext};

/// Where kernel code comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KernelSource {
    /// WGSL text.
    Inline(String),
    /// Path to a `.wgsl` file.
    File(PathBuf),
    /// Path to a precompiled SPIR-V library.
    Compiled(PathBuf),
}

impl KernelSource {
    /// Classifies a string: a single-line `*.spv` path is a compiled library,
    /// a single-line `*.wgsl` path is a source file, anything else is WGSL text.
    pub fn detect(source: &str) -> Self {
        let trimmed = source.trim();
        if !trimmed.contains('\n') {
            if trimmed.ends_with(".spv") {
                return KernelSource::Compiled(PathBuf::from(trimmed));
            }
            if trimmed.ends_with(".wgsl") {
                return KernelSource::File(PathBuf::from(trimmed));
            }
        }
        KernelSource::Inline(source.to_string())
    }

    pub fn load(&self, ctx: &WgpuContext, options: &CompileOptions) -> GpuResult<Library> {
        match self {
            KernelSource::Inline(text) => Library::from_source(ctx, text, options),
            KernelSource::File(path) => Library::from_file(ctx, path, options),
            KernelSource::Compiled(path) => Library::from_spirv_file(ctx, path, options),
        }
    }
}

impl From<&str> for KernelSource {
    fn from(source: &str) -> Self {
        Self::detect(source)
    }
}

/// Writes `file_out` as a copy of `file_in` with every `search` replaced by
/// `replace`. Returns the output path and the first kernel declared in the input.
pub fn file_replace(
    file_in: impl AsRef<Path>,
    file_out: impl AsRef<Path>,
    search: &str,
    replace: &str,
) -> GpuResult<(PathBuf, String)> {
    let (file_in, file_out) = (file_in.as_ref(), file_out.as_ref());
    let text = std::fs::read_to_string(file_in).map_err(|source| GpuError::Io {
        path: file_in.to_path_buf(),
        source,
    })?;
    let kernel = first_kernel_name(&text).ok_or(GpuError::NoKernel)?;
    std::fs::write(file_out, text.replace(search, replace)).map_err(|source| GpuError::Io {
        path: file_out.to_path_buf(),
        source,
    })?;
    Ok((file_out.to_path_buf(), kernel))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect() {
        assert_eq!(
            KernelSource::detect("shaders/fractal.spv"),
            KernelSource::Compiled(PathBuf::from("shaders/fractal.spv"))
        );
        assert_eq!(
            KernelSource::detect(" fractal.wgsl\n"),
            KernelSource::File(PathBuf::from("fractal.wgsl"))
        );
        let inline = "@compute @workgroup_size(1) fn main() {}";
        assert_eq!(KernelSource::detect(inline), KernelSource::Inline(inline.to_string()));
    }

    #[test]
    fn test_multiline_text_mentioning_wgsl_is_inline() {
        let text = "// see other.wgsl\n@compute @workgroup_size(1) fn main() {}\n// other.wgsl";
        assert!(matches!(KernelSource::detect(text), KernelSource::Inline(_)));
    }

    #[test]
    fn test_file_replace() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.wgsl");
        let output = dir.path().join("out.wgsl");
        std::fs::write(
            &input,
            "const ITER: u32 = 100u;\n@compute @workgroup_size(1) fn spin() {}\n",
        )
        .unwrap();

        let (path, kernel) = file_replace(&input, &output, "100u", "500u").unwrap();
        assert_eq!(path, output);
        assert_eq!(kernel, "spin");
        let written = std::fs::read_to_string(&output).unwrap();
        assert!(written.contains("ITER: u32 = 500u"));
    }

    #[test]
    fn test_file_replace_without_kernel() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.wgsl");
        std::fs::write(&input, "fn helper() {}").unwrap();
        let err = file_replace(&input, dir.path().join("out.wgsl"), "a", "b").unwrap_err();
        assert!(matches!(err, GpuError::NoKernel));
    }

    #[test]
    fn test_file_replace_missing_input() {
        let dir = tempfile::tempdir().unwrap();
        let err = file_replace(dir.path().join("nope.wgsl"), dir.path().join("out.wgsl"), "a", "b")
            .unwrap_err();
        assert!(matches!(err, GpuError::Io { .. }));
    }
}

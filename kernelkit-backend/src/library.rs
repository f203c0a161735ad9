//! Kernel libraries.
//!
//! A [`Library`] is a compiled shader module plus what could be learned from
//! its source: the `@compute` entry points and whether it sizes its
//! workgroups from `group_width` / `group_height`. Those two declarations are
//! rewritten into constants holding the planned group shape before the source
//! is compiled. Libraries loaded from SPIR-V carry neither.

use std::borrow::Cow;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use wgpu::{ComputePipeline, ShaderModule};

use crate::context::WgpuContext;
use crate::error::{validated, GpuError, GpuResult};
use crate::options::CompileOptions;
use crate::plan::Extent3;

/// Names the compiler fills with the planned group shape.
pub const GROUP_WIDTH_OVERRIDE: &str = "group_width";
pub const GROUP_HEIGHT_OVERRIDE: &str = "group_height";

const SPIRV_MAGIC: u32 = 0x0723_0203;

#[derive(Debug)]
struct LibraryInner {
    module: ShaderModule,
    /// WGSL text as given, kept for recompiling at another group shape.
    source: Option<String>,
    /// Group shape baked into `module`.
    group: Option<Extent3>,
    entries: Option<Vec<String>>,
    options: CompileOptions,
}

/// A compiled kernel library. Cheap to clone.
#[derive(Debug, Clone)]
pub struct Library {
    inner: Arc<LibraryInner>,
}

impl Library {
    /// Compiles WGSL source for the group shape of `ctx`.
    pub fn from_source(ctx: &WgpuContext, source: &str, options: &CompileOptions) -> GpuResult<Self> {
        log::debug!("openlibrary(source)");
        let tokens = tokenize(source);
        let group = declares_group_shape(&override_names(&tokens)).then(|| ctx.limits().group_shape());
        let module = compile_wgsl(ctx, source, group, options)?;

        Ok(Self {
            inner: Arc::new(LibraryInner {
                module,
                source: Some(source.to_string()),
                group,
                entries: Some(compute_entries(&tokens)),
                options: options.clone(),
            }),
        })
    }

    /// Reads and compiles a WGSL file.
    pub fn from_file(ctx: &WgpuContext, path: impl AsRef<Path>, options: &CompileOptions) -> GpuResult<Self> {
        Self::from_files(ctx, &[path], options)
    }

    /// Compiles the concatenation of several WGSL files.
    pub fn from_files<P: AsRef<Path>>(
        ctx: &WgpuContext,
        paths: &[P],
        options: &CompileOptions,
    ) -> GpuResult<Self> {
        let mut parts = Vec::with_capacity(paths.len());
        for path in paths {
            parts.push(read_text(path.as_ref())?);
        }
        Self::from_source(ctx, &parts.join("\n"), options)
    }

    /// Loads a precompiled SPIR-V library. Its workgroup size is whatever it
    /// was compiled with.
    pub fn from_spirv_file(ctx: &WgpuContext, path: impl AsRef<Path>, options: &CompileOptions) -> GpuResult<Self> {
        let path = path.as_ref();
        log::debug!("openlibrary(compiled): {}", path.display());
        let bytes = std::fs::read(path).map_err(|source| GpuError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        check_spirv(&bytes).inspect_err(|e| log::error!("load error: {}: {}", path.display(), e))?;

        let module = validated(&ctx.device, GpuError::Compile, || {
            ctx.device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: options.label.as_deref(),
                source: wgpu::util::make_spirv(&bytes),
            })
        })
        .inspect_err(|e| log::error!("load error: {}: {}", path.display(), e))?;

        Ok(Self {
            inner: Arc::new(LibraryInner {
                module,
                source: None,
                group: None,
                entries: None,
                options: options.clone(),
            }),
        })
    }

    /// `@compute` entry points in declaration order, if known.
    pub fn entries(&self) -> Option<&[String]> {
        self.inner.entries.as_deref()
    }

    pub fn function(&self, name: &str) -> GpuResult<Kernel> {
        if let Some(entries) = &self.inner.entries {
            if !entries.iter().any(|e| e == name) {
                return Err(GpuError::KernelNotFound {
                    name: name.to_string(),
                    available: entries.clone(),
                });
            }
        }
        Ok(Kernel {
            library: self.clone(),
            name: name.to_string(),
        })
    }

    /// The first `@compute` entry point in the source.
    pub fn first_function(&self) -> GpuResult<Kernel> {
        let name = self
            .inner
            .entries
            .as_ref()
            .and_then(|entries| entries.first())
            .ok_or(GpuError::NoKernel)?;
        self.function(name)
    }
}

/// One entry point of a [`Library`].
#[derive(Debug, Clone)]
pub struct Kernel {
    library: Library,
    name: String,
}

impl Kernel {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether dispatches run with the planned group shape. `false` for SPIR-V
    /// and for WGSL with a fixed `@workgroup_size`.
    pub fn uses_planned_group(&self) -> bool {
        self.library.inner.group.is_some()
    }

    /// Pipeline-overridable constants from the compile options.
    fn constants(&self) -> HashMap<String, f64> {
        let mut constants = self.library.inner.options.constants.clone();
        if self.uses_planned_group() {
            for name in [GROUP_WIDTH_OVERRIDE, GROUP_HEIGHT_OVERRIDE] {
                if let Some(value) = constants.remove(name) {
                    log::warn!("{} = {} ignored, the planned group shape is compiled in", name, value);
                }
            }
        }
        constants
    }

    /// Builds the compute pipeline for this entry point, recompiling the
    /// source if `group` differs from the shape it was compiled for.
    pub fn pipeline(&self, ctx: &WgpuContext, group: Extent3) -> GpuResult<ComputePipeline> {
        let inner = &self.library.inner;
        let respecialized;
        let module = match (&inner.source, inner.group) {
            (Some(source), Some(baked)) if baked != group => {
                log::debug!("recompiling {} for group {} (was {})", self.name, group, baked);
                respecialized = compile_wgsl(ctx, source, Some(group), &inner.options)?;
                &respecialized
            }
            _ => &inner.module,
        };

        let constants = self.constants();
        validated(&ctx.device, GpuError::Pipeline, || {
            ctx.device
                .create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                    label: Some(&self.name),
                    layout: None,
                    module,
                    entry_point: &self.name,
                    compilation_options: wgpu::PipelineCompilationOptions {
                        constants: &constants,
                        zero_initialize_workgroup_memory: inner.options.zero_initialize_workgroup_memory,
                        ..Default::default()
                    },
                    cache: None,
                })
        })
    }
}

fn compile_wgsl(
    ctx: &WgpuContext,
    source: &str,
    group: Option<Extent3>,
    options: &CompileOptions,
) -> GpuResult<ShaderModule> {
    let text = match group {
        Some(group) => Cow::Owned(specialize(source, group)),
        None => Cow::Borrowed(source),
    };
    validated(&ctx.device, GpuError::Compile, || {
        ctx.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: options.label.as_deref(),
            source: wgpu::ShaderSource::Wgsl(text),
        })
    })
    .inspect_err(|e| log::error!("{}", e))
}

/// Rewrites the `group_width` / `group_height` override declarations in WGSL
/// into constants holding `group`.
pub fn specialize(source: &str, group: Extent3) -> String {
    let mut out = source.to_string();
    for (name, value) in [
        (GROUP_WIDTH_OVERRIDE, group.width),
        (GROUP_HEIGHT_OVERRIDE, group.height),
    ] {
        if let Some((start, end)) = find_override(&out, name) {
            let ty = declared_type(&out[start..end], name);
            let decl = match ty {
                Some(ty) => format!("const {}: {} = {}({});", name, ty, ty, value),
                None => format!("const {} = {}u;", name, value),
            };
            out.replace_range(start..end, &decl);
        }
    }
    out
}

/// Byte range of `override <name> ... ;` outside line comments.
fn find_override(source: &str, name: &str) -> Option<(usize, usize)> {
    const KEYWORD: &str = "override";
    let is_ident = |c: char| c.is_ascii_alphanumeric() || c == '_';

    let mut from = 0;
    while let Some(pos) = source[from..].find(KEYWORD) {
        let start = from + pos;
        from = start + KEYWORD.len();

        let line_start = source[..start].rfind('\n').map_or(0, |i| i + 1);
        if source[line_start..start].contains("//") {
            continue;
        }
        if source[..start].chars().next_back().is_some_and(is_ident) {
            continue;
        }
        let after = &source[from..];
        let rest = after.trim_start();
        if rest.len() == after.len() || !rest.starts_with(name) {
            continue;
        }
        if rest[name.len()..].starts_with(is_ident) {
            continue;
        }
        let end = from + after.find(';')? + 1;
        return Some((start, end));
    }
    None
}

/// Type annotation of an `override <name>: <type> ...;` declaration.
fn declared_type<'a>(decl: &'a str, name: &str) -> Option<&'a str> {
    let after_name = &decl[decl.find(name)? + name.len()..];
    let rest = after_name.trim_start().strip_prefix(':')?;
    let ty = rest.split(['=', ';']).next()?.trim();
    (!ty.is_empty()).then_some(ty)
}

fn declares_group_shape(overrides: &[String]) -> bool {
    overrides
        .iter()
        .any(|o| o == GROUP_WIDTH_OVERRIDE || o == GROUP_HEIGHT_OVERRIDE)
}

fn read_text(path: &Path) -> GpuResult<String> {
    std::fs::read_to_string(path).map_err(|source| GpuError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn check_spirv(bytes: &[u8]) -> GpuResult<()> {
    if bytes.len() < 4 || bytes.len() % 4 != 0 {
        return Err(GpuError::Compile(format!(
            "SPIR-V length {} is not a positive multiple of 4",
            bytes.len()
        )));
    }
    let word = [bytes[0], bytes[1], bytes[2], bytes[3]];
    if u32::from_le_bytes(word) != SPIRV_MAGIC && u32::from_be_bytes(word) != SPIRV_MAGIC {
        return Err(GpuError::Compile("missing SPIR-V magic number".to_string()));
    }
    Ok(())
}

/// Splits WGSL into identifiers and single punctuation characters, dropping comments.
pub(crate) fn tokenize(source: &str) -> Vec<&str> {
    let bytes = source.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        let c = bytes[i];
        if c == b'/' && bytes.get(i + 1) == Some(&b'/') {
            while i < bytes.len() && bytes[i] != b'\n' {
                i += 1;
            }
        } else if c == b'/' && bytes.get(i + 1) == Some(&b'*') {
            // WGSL block comments nest.
            let mut depth = 0usize;
            while i < bytes.len() {
                if bytes[i] == b'/' && bytes.get(i + 1) == Some(&b'*') {
                    depth += 1;
                    i += 2;
                } else if bytes[i] == b'*' && bytes.get(i + 1) == Some(&b'/') {
                    depth -= 1;
                    i += 2;
                    if depth == 0 {
                        break;
                    }
                } else {
                    i += 1;
                }
            }
        } else if c.is_ascii_alphanumeric() || c == b'_' {
            let start = i;
            while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
                i += 1;
            }
            tokens.push(&source[start..i]);
        } else if c.is_ascii_whitespace() || !c.is_ascii() {
            i += 1;
        } else {
            tokens.push(&source[i..i + 1]);
            i += 1;
        }
    }
    tokens
}

/// Names of functions marked `@compute`, in order.
pub(crate) fn compute_entries(tokens: &[&str]) -> Vec<String> {
    let mut entries = Vec::new();
    let mut pending = false;
    let mut iter = tokens.iter().peekable();
    while let Some(&token) = iter.next() {
        match token {
            "@" if iter.peek() == Some(&&"compute") => {
                pending = true;
                iter.next();
            }
            "fn" => {
                if let Some(&&name) = iter.peek() {
                    if pending {
                        entries.push(name.to_string());
                    }
                }
                pending = false;
            }
            _ => {}
        }
    }
    entries
}

/// Names declared with `override`.
pub(crate) fn override_names(tokens: &[&str]) -> Vec<String> {
    tokens
        .windows(2)
        .filter(|pair| pair[0] == "override")
        .map(|pair| pair[1].to_string())
        .collect()
}

/// First `@compute` entry point in WGSL source.
pub fn first_kernel_name(source: &str) -> Option<String> {
    compute_entries(&tokenize(source)).into_iter().next()
}

//! # MDC URLs: Remote Image Transformations
//!
//! The DAM's delivery endpoint resizes, crops and converts images on the fly. Operations are
//! appended to the asset's base delivery URL as suffix fragments, always in this order:
//!
//! | Fragment | Syntax | Meaning |
//! |----------|--------|---------|
//! | boxed    | `-B<size>` | fit into a `size`×`size` square |
//! | scaled   | `-S<w>x<h>` | scale down to `w`×`h` |
//! | format   | `-F<EXT>` | convert (`JPG`, `WEBP`, `PNG`, `TIF`, `GIF`, `JP2`) |
//! | cropped  | `-C<w>x<h>,<x>,<y>` | crop a `w`×`h` region at offset `x`,`y` |
//!
//! Boxed and scaled are mutually exclusive; boxed wins.
//!
//! ## From a Processing Task to Fragments
//!
//! A host processing task declares what it wants (width, height, max sizes, crop area, target
//! extension). [`MdcUrlGenerator::transform_configuration`] resolves that into an
//! [`MdcConfiguration`]:
//!
//! 1. Explicit width *and* height win outright.
//! 2. Otherwise: target dimensions → single configured width/height → max width/height →
//!    master dimensions → 0. A crop area clamps both to its own size.
//! 3. Equal width and height become the boxed size.
//! 4. The target extension, uppercased, becomes the format.
//!
//! ## Master Dimensions
//!
//! Transformations are computed against a *master* image whose longest edge is the
//! configured master size. The factor is `min(1, master / native_w, master / native_h)`, so
//! it never upscales. Crop areas arrive in display space and are multiplied by that factor.
//!
//! ## Overriding the Suffix
//!
//! [`compose_suffix`] passes its result through a [`SuffixHook`] on every call. The default
//! [`IdentityHook`] returns it unchanged; integrations can swap in their own to rewrite or
//! replace the fragments.

use crate::error::Result;
use crate::identifier::CombinedIdentifier;
use crate::repository::Repository;
use percent_encoding::percent_decode_str;

pub const BOXED: &str = "-B";
pub const SCALED: &str = "-S";
pub const FORMATTED: &str = "-F";
pub const CROPPED: &str = "-C";

/// A crop rectangle in display space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Area {
    pub width: f64,
    pub height: f64,
    pub offset_left: f64,
    pub offset_top: f64,
}

impl Area {
    pub fn new(width: f64, height: f64, offset_left: f64, offset_top: f64) -> Self {
        Self {
            width,
            height,
            offset_left,
            offset_top,
        }
    }
}

/// A crop rectangle in master pixel space, as sent to the DAM.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRegion {
    pub width: u64,
    pub height: u64,
    pub offset_left: u64,
    pub offset_top: u64,
}

/// What a processing task asks for.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProcessingConfiguration {
    pub width: Option<u64>,
    pub height: Option<u64>,
    pub max_width: Option<u64>,
    pub max_height: Option<u64>,
    pub crop: Option<Area>,
    pub file_extension: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProcessingTask {
    pub source: CombinedIdentifier,
    pub configuration: ProcessingConfiguration,
    /// Output size the host computed for this task, if any.
    pub target_dimensions: Option<(u64, u64)>,
    /// Native size the host knows about, used when the DAM does not report one.
    pub source_dimensions: Option<(u64, u64)>,
}

impl ProcessingTask {
    pub fn new(source: CombinedIdentifier, configuration: ProcessingConfiguration) -> Self {
        Self {
            source,
            configuration,
            target_dimensions: None,
            source_dimensions: None,
        }
    }

    pub fn with_target_dimensions(mut self, width: u64, height: u64) -> Self {
        self.target_dimensions = Some((width, height));
        self
    }

    pub fn with_source_dimensions(mut self, width: u64, height: u64) -> Self {
        self.source_dimensions = Some((width, height));
        self
    }
}

/// Native dimensions scaled down to the master size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MasterDimensions {
    pub width: f64,
    pub height: f64,
    pub scale: f64,
}

impl MasterDimensions {
    pub fn from_native(native_width: u64, native_height: u64, master_image_size: u32) -> Self {
        let (w, h) = (native_width as f64, native_height as f64);
        let master = f64::from(master_image_size);
        let scale = if w <= 0.0 || h <= 0.0 {
            1.0
        } else {
            1f64.min(master / w).min(master / h)
        };
        Self {
            width: scale * w,
            height: scale * h,
            scale,
        }
    }

    fn resize(&self, area: &Area) -> CropRegion {
        CropRegion {
            width: (area.width * self.scale) as u64,
            height: (area.height * self.scale) as u64,
            offset_left: (area.offset_left * self.scale) as u64,
            offset_top: (area.offset_top * self.scale) as u64,
        }
    }
}

/// Resolved transformation request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MdcConfiguration {
    pub width: Option<u64>,
    pub height: Option<u64>,
    pub size: Option<u64>,
    pub format: Option<String>,
    pub crop: Option<Area>,
    pub resized_crop: Option<CropRegion>,
}

impl MdcConfiguration {
    /// Scale to exactly this size, nothing else.
    pub fn scaled(width: u64, height: u64) -> Self {
        Self {
            width: Some(width),
            height: Some(height),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SuffixFragments {
    pub scale: String,
    pub format: String,
    pub crop: String,
}

impl SuffixFragments {
    pub fn joined(&self) -> String {
        format!("{}{}{}", self.scale, self.format, self.crop)
    }
}

/// Last word on the suffix appended to a delivery URL.
pub trait SuffixHook {
    fn apply(
        &self,
        fragments: &SuffixFragments,
        configuration: &MdcConfiguration,
        suffix: String,
    ) -> String;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityHook;

impl SuffixHook for IdentityHook {
    fn apply(&self, _: &SuffixFragments, _: &MdcConfiguration, suffix: String) -> String {
        suffix
    }
}

impl<F> SuffixHook for F
where
    F: Fn(&SuffixFragments, &MdcConfiguration, String) -> String,
{
    fn apply(
        &self,
        fragments: &SuffixFragments,
        configuration: &MdcConfiguration,
        suffix: String,
    ) -> String {
        self(fragments, configuration, suffix)
    }
}

pub fn suffix_fragments(configuration: &MdcConfiguration) -> SuffixFragments {
    let scale = match (configuration.size, configuration.width, configuration.height) {
        (Some(size), _, _) => format!("{}{}", BOXED, size),
        (None, Some(width), Some(height)) => format!("{}{}x{}", SCALED, width, height),
        _ => String::new(),
    };
    let format = configuration
        .format
        .as_deref()
        .map(|format| format!("{}{}", FORMATTED, format))
        .unwrap_or_default();
    let crop = match (&configuration.crop, &configuration.resized_crop) {
        (Some(_), Some(region)) => format!(
            "{}{}x{},{},{}",
            CROPPED, region.width, region.height, region.offset_left, region.offset_top
        ),
        _ => String::new(),
    };
    SuffixFragments {
        scale,
        format,
        crop,
    }
}

pub fn compose_suffix(configuration: &MdcConfiguration, hook: &dyn SuffixHook) -> String {
    let fragments = suffix_fragments(configuration);
    let suffix = fragments.joined();
    hook.apply(&fragments, configuration, suffix)
}

/// Percent-decodes a delivery URL before it is handed to the host.
pub fn decode_url(url: &str) -> String {
    percent_decode_str(url).decode_utf8_lossy().into_owned()
}

pub struct MdcUrlGenerator {
    master_image_size: u32,
    hook: Box<dyn SuffixHook>,
}

impl MdcUrlGenerator {
    pub fn new(master_image_size: u32) -> Self {
        Self {
            master_image_size,
            hook: Box::new(IdentityHook),
        }
    }

    pub fn with_hook(mut self, hook: impl SuffixHook + 'static) -> Self {
        self.hook = Box::new(hook);
        self
    }

    pub fn master_image_size(&self) -> u32 {
        self.master_image_size
    }

    pub fn compose_suffix(&self, configuration: &MdcConfiguration) -> String {
        compose_suffix(configuration, self.hook.as_ref())
    }

    /// Full delivery URL for a processing task, percent-decoded.
    pub fn generate<R: Repository>(&self, repository: &R, task: &ProcessingTask) -> Result<String> {
        let configuration = self.transform_configuration(repository, task)?;
        let base = repository.generate_mdc_base_url(&task.source.remote_id)?;
        Ok(decode_url(&format!(
            "{}{}",
            base,
            self.compose_suffix(&configuration)
        )))
    }

    /// Output size of a task, capped by its max width and height.
    pub fn resolve_display_dimensions<R: Repository>(
        &self,
        repository: &R,
        task: &ProcessingTask,
    ) -> Result<(u64, u64)> {
        let configuration = self.transform_configuration(repository, task)?;
        let cap = |value: Option<u64>, max: Option<u64>| value.unwrap_or(0).min(max.unwrap_or(u64::MAX));
        Ok((
            cap(configuration.width, task.configuration.max_width),
            cap(configuration.height, task.configuration.max_height),
        ))
    }

    pub fn master_dimensions<R: Repository>(
        &self,
        repository: &R,
        task: &ProcessingTask,
    ) -> Result<MasterDimensions> {
        let remote = repository
            .get_file_details(task.source.scheme, &task.source.remote_id, false)?
            .native_dimensions();
        let (width, height) = remote.or(task.source_dimensions).unwrap_or((0, 0));
        Ok(MasterDimensions::from_native(
            width,
            height,
            self.master_image_size,
        ))
    }

    pub fn transform_configuration<R: Repository>(
        &self,
        repository: &R,
        task: &ProcessingTask,
    ) -> Result<MdcConfiguration> {
        let requested = &task.configuration;
        let nonzero = |value: Option<u64>| value.filter(|v| *v > 0);

        let mut master = None;
        let (width, height) = match (nonzero(requested.width), nonzero(requested.height)) {
            (Some(width), Some(height)) => (width, height),
            _ => {
                let dims = self.master_dimensions(repository, task)?;
                master = Some(dims);
                let (target_w, target_h) = task.target_dimensions.unwrap_or((0, 0));
                let mut width = nonzero(Some(target_w))
                    .or(nonzero(requested.width))
                    .or(requested.max_width)
                    .unwrap_or(dims.width as u64);
                let mut height = nonzero(Some(target_h))
                    .or(nonzero(requested.height))
                    .or(requested.max_height)
                    .unwrap_or(dims.height as u64);
                if let Some(crop) = &requested.crop {
                    width = width.min(crop.width as u64);
                    height = height.min(crop.height as u64);
                }
                (width, height)
            }
        };

        let resized_crop = match &requested.crop {
            Some(crop) => {
                let dims = match master {
                    Some(dims) => dims,
                    None => self.master_dimensions(repository, task)?,
                };
                Some(dims.resize(crop))
            }
            None => None,
        };

        Ok(MdcConfiguration {
            width: Some(width),
            height: Some(height),
            size: (width == height && width > 0).then_some(width),
            format: requested
                .file_extension
                .as_deref()
                .filter(|ext| !ext.is_empty())
                .map(|ext| ext.trim_start_matches('.').to_uppercase()),
            crop: requested.crop,
            resized_crop,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identifier::Scheme;
    use crate::repository::memory::fixtures::library;
    use crate::repository::CachedRepository;

    fn logo() -> CombinedIdentifier {
        CombinedIdentifier::new(Scheme::Image, "logo")
    }

    fn task(configuration: ProcessingConfiguration) -> ProcessingTask {
        ProcessingTask::new(logo(), configuration)
    }

    #[test]
    fn test_master_scale_never_upscales() {
        let dims = MasterDimensions::from_native(4000, 3000, 1600);
        assert_eq!(dims.scale, 0.4);
        assert_eq!((dims.width, dims.height), (1600.0, 1200.0));

        let small = MasterDimensions::from_native(800, 600, 1600);
        assert_eq!(small.scale, 1.0);

        let portrait = MasterDimensions::from_native(1000, 4000, 2000);
        assert_eq!(portrait.scale, 0.5);

        assert_eq!(MasterDimensions::from_native(0, 0, 1600).scale, 1.0);
    }

    #[test]
    fn test_explicit_width_height_scales() {
        let repo = CachedRepository::new(library());
        let generator = MdcUrlGenerator::new(1600);
        let config = generator
            .transform_configuration(
                &repo,
                &task(ProcessingConfiguration {
                    width: Some(800),
                    height: Some(600),
                    ..Default::default()
                }),
            )
            .unwrap();
        assert_eq!(generator.compose_suffix(&config), "-S800x600");
        // Explicit dimensions need no native size.
        assert_eq!(repo.remote().calls("fetch_asset"), 0);
    }

    #[test]
    fn test_square_becomes_boxed() {
        let repo = CachedRepository::new(library());
        let generator = MdcUrlGenerator::new(1600);
        let config = generator
            .transform_configuration(
                &repo,
                &task(ProcessingConfiguration {
                    width: Some(500),
                    height: Some(500),
                    ..Default::default()
                }),
            )
            .unwrap();
        assert_eq!(config.size, Some(500));
        assert_eq!(generator.compose_suffix(&config), "-B500");
    }

    #[test]
    fn test_crop_is_scaled_to_master_space() {
        let repo = CachedRepository::new(library());
        let generator = MdcUrlGenerator::new(2000);
        let config = generator
            .transform_configuration(
                &repo,
                &task(ProcessingConfiguration {
                    crop: Some(Area::new(400.0, 300.0, 100.0, 50.0)),
                    ..Default::default()
                }),
            )
            .unwrap();
        let fragments = suffix_fragments(&config);
        assert_eq!(fragments.crop, "-C200x150,50,25");
        // Master is 2000x1500, clamped to the crop area.
        assert_eq!(fragments.scale, "-S400x300");
        assert_eq!(fragments.format, "");
    }

    #[test]
    fn test_fallback_to_master_dimensions() {
        let repo = CachedRepository::new(library());
        let generator = MdcUrlGenerator::new(1600);
        let config = generator
            .transform_configuration(&repo, &task(ProcessingConfiguration::default()))
            .unwrap();
        assert_eq!((config.width, config.height), (Some(1600), Some(1200)));
    }

    #[test]
    fn test_resolution_precedence() {
        let repo = CachedRepository::new(library());
        let generator = MdcUrlGenerator::new(1600);

        let with_target = task(ProcessingConfiguration {
            max_width: Some(300),
            max_height: Some(200),
            ..Default::default()
        })
        .with_target_dimensions(640, 480);
        let config = generator.transform_configuration(&repo, &with_target).unwrap();
        assert_eq!((config.width, config.height), (Some(640), Some(480)));

        let max_only = task(ProcessingConfiguration {
            max_width: Some(300),
            max_height: Some(200),
            ..Default::default()
        });
        let config = generator.transform_configuration(&repo, &max_only).unwrap();
        assert_eq!((config.width, config.height), (Some(300), Some(200)));

        let width_only = task(ProcessingConfiguration {
            width: Some(320),
            ..Default::default()
        });
        let config = generator.transform_configuration(&repo, &width_only).unwrap();
        assert_eq!((config.width, config.height), (Some(320), Some(1200)));
    }

    #[test]
    fn test_source_dimensions_used_when_remote_has_none() {
        let repo = CachedRepository::new(library());
        let generator = MdcUrlGenerator::new(1000);
        let photo = ProcessingTask::new(
            CombinedIdentifier::new(Scheme::Image, "img1"),
            ProcessingConfiguration::default(),
        )
        .with_source_dimensions(2000, 1000);
        let config = generator.transform_configuration(&repo, &photo).unwrap();
        assert_eq!((config.width, config.height), (Some(1000), Some(500)));
    }

    #[test]
    fn test_format_fragment() {
        let config = MdcConfiguration {
            format: Some("WEBP".into()),
            ..MdcConfiguration::scaled(100, 50)
        };
        assert_eq!(compose_suffix(&config, &IdentityHook), "-S100x50-FWEBP");

        let repo = CachedRepository::new(library());
        let generator = MdcUrlGenerator::new(1600);
        let config = generator
            .transform_configuration(
                &repo,
                &task(ProcessingConfiguration {
                    width: Some(100),
                    height: Some(50),
                    file_extension: Some("webp".into()),
                    ..Default::default()
                }),
            )
            .unwrap();
        assert_eq!(config.format.as_deref(), Some("WEBP"));
    }

    #[test]
    fn test_fragment_order() {
        let config = MdcConfiguration {
            width: Some(10),
            height: Some(10),
            size: Some(10),
            format: Some("PNG".into()),
            crop: Some(Area::new(1.0, 1.0, 0.0, 0.0)),
            resized_crop: Some(CropRegion {
                width: 4,
                height: 3,
                offset_left: 2,
                offset_top: 1,
            }),
        };
        assert_eq!(compose_suffix(&config, &IdentityHook), "-B10-FPNG-C4x3,2,1");
    }

    #[test]
    fn test_empty_configuration_has_no_fragments() {
        assert_eq!(compose_suffix(&MdcConfiguration::default(), &IdentityHook), "");
    }

    #[test]
    fn test_hook_is_always_invoked() {
        use std::cell::Cell;

        let calls = Cell::new(0);
        let counting = |_: &SuffixFragments, _: &MdcConfiguration, suffix: String| {
            calls.set(calls.get() + 1);
            suffix
        };
        assert_eq!(compose_suffix(&MdcConfiguration::default(), &counting), "");
        assert_eq!(
            compose_suffix(&MdcConfiguration::scaled(1, 2), &counting),
            "-S1x2"
        );
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn test_hook_can_override() {
        let generator = MdcUrlGenerator::new(1600).with_hook(
            |fragments: &SuffixFragments, _: &MdcConfiguration, _: String| {
                format!("{}-FWEBP", fragments.scale)
            },
        );
        assert_eq!(
            generator.compose_suffix(&MdcConfiguration::scaled(800, 600)),
            "-S800x600-FWEBP"
        );
    }

    #[test]
    fn test_generate_full_url() {
        let repo = CachedRepository::new(library());
        let generator = MdcUrlGenerator::new(1600);
        let url = generator
            .generate(
                &repo,
                &task(ProcessingConfiguration {
                    width: Some(800),
                    height: Some(600),
                    ..Default::default()
                }),
            )
            .unwrap();
        assert_eq!(url, "https://acme.canto.com/direct/image/logo-S800x600");
    }

    #[test]
    fn test_resolve_display_dimensions_caps_to_max() {
        let repo = CachedRepository::new(library());
        let generator = MdcUrlGenerator::new(1600);
        let dims = generator
            .resolve_display_dimensions(
                &repo,
                &task(ProcessingConfiguration {
                    width: Some(800),
                    height: Some(600),
                    max_width: Some(400),
                    ..Default::default()
                }),
            )
            .unwrap();
        assert_eq!(dims, (400, 600));
    }

    #[test]
    fn test_decode_url() {
        assert_eq!(
            decode_url("https://cdn.acme.test/logo%20final.png"),
            "https://cdn.acme.test/logo final.png"
        );
        assert_eq!(decode_url("a+b"), "a+b");
    }
}

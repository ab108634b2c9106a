pub mod liquid;
pub mod mesh;
pub mod services;
pub mod strip;
pub mod subdivide;
pub mod surface;
pub mod transcode;

extern crate bsp;
#[macro_use]
extern crate log;

use bsp::console::ConsoleBsp;
use bsp::error::BspResult;
use bsp::pc::PcBsp;
use serde::{Deserialize, Serialize};

pub use bsp::lump::Format;
pub use services::{EntityService, PassthroughEntities, PassthroughTextures, TextureService};

/// Tunables of one conversion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConvertOptions {
    /// Texture-space cut spacing for console rendering polygons.
    pub console_step: f32,
    /// World-space cut spacing when splitting PC liquid faces.
    pub liquid_step: f32,
    /// Liquid faces with a wider lightmap extent get split.
    pub max_liquid_extent: u32,
    pub epsilon: f32,
    pub strip_budget: usize,
    pub fix_liquids: bool,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        ConvertOptions {
            console_step: 32.0,
            liquid_step: 240.0,
            max_liquid_extent: 256,
            epsilon: subdivide::ON_EPSILON,
            strip_budget: strip::DEFAULT_STRIP_BUDGET,
            fix_liquids: true,
        }
    }
}

/// Converts whole maps between the PC and console layouts.
pub struct Transcoder {
    options: ConvertOptions,
    textures: Box<dyn TextureService>,
    entities: Box<dyn EntityService>,
}

impl Transcoder {
    pub fn new(options: ConvertOptions) -> Transcoder {
        Transcoder {
            options,
            textures: Box::new(PassthroughTextures),
            entities: Box::new(PassthroughEntities),
        }
    }

    pub fn with_texture_service(mut self, service: impl TextureService + 'static) -> Transcoder {
        self.textures = Box::new(service);
        self
    }

    pub fn with_entity_service(mut self, service: impl EntityService + 'static) -> Transcoder {
        self.entities = Box::new(service);
        self
    }

    /// Reads a map in either layout and writes it in `target`. A map already
    /// in `target` is validated and rewritten.
    pub fn convert(&self, data: &[u8], target: Format) -> BspResult<Vec<u8>> {
        let source = Format::detect(data).unwrap_or_else(|| target.other());
        match (source, target) {
            (Format::Pc, Format::Console) => {
                self.pc_to_console(&PcBsp::from_bytes(data)?)?.to_bytes()
            }
            (Format::Console, Format::Pc) => {
                self.console_to_pc(&ConsoleBsp::from_bytes(data)?)?.to_bytes()
            }
            (Format::Pc, Format::Pc) => PcBsp::from_bytes(data)?.to_bytes(),
            (Format::Console, Format::Console) => ConsoleBsp::from_bytes(data)?.to_bytes(),
        }
    }

    pub fn pc_to_console(&self, pc: &PcBsp) -> BspResult<ConsoleBsp> {
        transcode::pc_to_console(pc, &self.options, self.textures.as_ref(), self.entities.as_ref())
    }

    pub fn console_to_pc(&self, console: &ConsoleBsp) -> BspResult<PcBsp> {
        transcode::console_to_pc(
            console,
            &self.options,
            self.textures.as_ref(),
            self.entities.as_ref(),
        )
    }
}

impl Default for Transcoder {
    fn default() -> Self {
        Transcoder::new(ConvertOptions::default())
    }
}

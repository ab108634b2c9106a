use bsp::error::BspResult;
use bsp::lump::Format;
use bsp::texture::Texture;
use bsp::types::TextureIndex;

/// Converts texture payloads between the two formats. Resampling, palette
/// work and deduplication live behind this trait.
pub trait TextureService {
    /// Returns the converted textures and, for each input slot, the slot it
    /// ended up in.
    fn convert(
        &self,
        textures: &[Option<Texture>],
        target: Format,
    ) -> BspResult<(Vec<Option<Texture>>, Vec<TextureIndex>)>;

    /// Size used to normalize texture coordinates.
    fn dimensions(&self, texture: &Texture) -> (u32, u32) {
        (texture.width, texture.height)
    }
}

/// Keeps payloads untouched, one output slot per input slot.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughTextures;

impl TextureService for PassthroughTextures {
    fn convert(
        &self,
        textures: &[Option<Texture>],
        target: Format,
    ) -> BspResult<(Vec<Option<Texture>>, Vec<TextureIndex>)> {
        let converted = textures
            .iter()
            .map(|texture| {
                texture.clone().map(|mut texture| {
                    if target == Format::Pc {
                        texture.anim_next = None;
                        texture.anim_alternate = None;
                    }
                    texture
                })
            })
            .collect();
        let remap = (0..textures.len()).map(TextureIndex::new).collect();
        Ok((converted, remap))
    }
}

/// Rewrites the entity text for the target engine.
pub trait EntityService {
    fn rewrite(&self, text: &[u8], target: Format) -> BspResult<Vec<u8>>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughEntities;

impl EntityService for PassthroughEntities {
    fn rewrite(&self, text: &[u8], _target: Format) -> BspResult<Vec<u8>> {
        Ok(text.to_vec())
    }
}

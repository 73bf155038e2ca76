//! Codecs for the built-in user types and the default codec set.

use std::sync::Arc;

use cfc_types::{
    ComponentIdentifier, LocalComponentMetadata, ModuleIdentifier, ModuleVersionIdentifier,
    ProjectHandle, ProjectPath, StateType,
};

use crate::codec::{Codec, TypeTag};
use crate::context::{ReadContext, WriteContext};
use crate::error::{CodecError, CodecResult};
use crate::isolate::IsolateContext;
use crate::registry::{CodecRegistry, CodecRegistryBuilder};

/// Wire tags of the built-in codecs.
///
/// Tags are part of the entry format: a tag may be added but never
/// reassigned.
pub mod tags {
    use crate::codec::TypeTag;

    pub const STRING: TypeTag = TypeTag(1);
    pub const BOOL: TypeTag = TypeTag(2);
    pub const U32: TypeTag = TypeTag(3);
    pub const U64: TypeTag = TypeTag(4);
    pub const I64: TypeTag = TypeTag(5);
    pub const BYTES: TypeTag = TypeTag(6);

    pub const PROJECT_PATH: TypeTag = TypeTag(16);
    pub const STATE_TYPE: TypeTag = TypeTag(17);
    pub const MODULE_ID: TypeTag = TypeTag(18);
    pub const MODULE_VERSION_ID: TypeTag = TypeTag(19);
    pub const COMPONENT_ID: TypeTag = TypeTag(20);
    pub const LOCAL_COMPONENT_METADATA: TypeTag = TypeTag(21);
    pub const PROJECT_HANDLE: TypeTag = TypeTag(22);

    /// First tag available to codecs registered outside this crate.
    pub const FIRST_EXTERNAL: TypeTag = TypeTag(256);
}

macro_rules! copy_codec {
    ($name:ident, $value:ty, $write:ident, $read:ident) => {
        #[derive(Clone, Copy, Debug, Default)]
        pub struct $name;

        impl Codec for $name {
            type Value = $value;

            fn encode(&self, ctx: &mut WriteContext, value: &$value) -> CodecResult<()> {
                ctx.encoder().$write(*value);
                Ok(())
            }

            fn decode(&self, ctx: &mut ReadContext<'_>) -> CodecResult<$value> {
                Ok(ctx.decoder().$read()?)
            }
        }
    };
}

copy_codec!(BoolCodec, bool, write_bool, read_bool);
copy_codec!(U32Codec, u32, write_u32, read_u32);
copy_codec!(U64Codec, u64, write_varint, read_varint);
copy_codec!(I64Codec, i64, write_i64, read_i64);

#[derive(Clone, Copy, Debug, Default)]
pub struct StringCodec;

impl Codec for StringCodec {
    type Value = String;

    fn encode(&self, ctx: &mut WriteContext, value: &String) -> CodecResult<()> {
        ctx.encoder().write_str(value);
        Ok(())
    }

    fn decode(&self, ctx: &mut ReadContext<'_>) -> CodecResult<String> {
        Ok(ctx.decoder().read_string()?)
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct BytesCodec;

impl Codec for BytesCodec {
    type Value = Vec<u8>;

    fn encode(&self, ctx: &mut WriteContext, value: &Vec<u8>) -> CodecResult<()> {
        ctx.encoder().write_bytes(value);
        Ok(())
    }

    fn decode(&self, ctx: &mut ReadContext<'_>) -> CodecResult<Vec<u8>> {
        Ok(ctx.decoder().read_bytes()?.to_vec())
    }
}

/// Project paths, stored relative to the owner's project.
///
/// A path below the owner's project is written as the relative remainder and
/// resolved against the reading owner, so the same entry bytes stay valid for
/// whatever project the entry belongs to. Other paths are written as they are.
#[derive(Clone, Copy, Debug, Default)]
pub struct ProjectPathCodec;

impl Codec for ProjectPathCodec {
    type Value = ProjectPath;

    fn encode(&self, ctx: &mut WriteContext, value: &ProjectPath) -> CodecResult<()> {
        let base = ctx.owner()?.base_path();
        let written = value.relative_to(&base);
        let owner_relative = value.is_absolute() && !written.is_absolute();
        let encoder = ctx.encoder();
        encoder.write_bool(owner_relative);
        encoder.write_str(&written.to_string());
        Ok(())
    }

    fn decode(&self, ctx: &mut ReadContext<'_>) -> CodecResult<ProjectPath> {
        let owner_relative = ctx.decoder().read_bool()?;
        let offset = ctx.decoder().position();
        let path = ProjectPath::parse(ctx.decoder().read_str()?)?;
        if !owner_relative {
            return Ok(path);
        }
        if path.is_absolute() {
            return Err(CodecError::corrupt(
                offset,
                format!("owner-relative project path {path} is absolute"),
            ));
        }
        Ok(ctx.owner()?.base_path().resolve(&path))
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct StateTypeCodec;

impl Codec for StateTypeCodec {
    type Value = StateType;

    fn encode(&self, ctx: &mut WriteContext, value: &StateType) -> CodecResult<()> {
        ctx.encoder().write_u8(value.tag());
        Ok(())
    }

    fn decode(&self, ctx: &mut ReadContext<'_>) -> CodecResult<StateType> {
        Ok(StateType::from_tag(ctx.decoder().read_u8()?)?)
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct ModuleIdentifierCodec;

impl Codec for ModuleIdentifierCodec {
    type Value = ModuleIdentifier;

    fn encode(&self, ctx: &mut WriteContext, value: &ModuleIdentifier) -> CodecResult<()> {
        let encoder = ctx.encoder();
        encoder.write_str(&value.group);
        encoder.write_str(&value.name);
        Ok(())
    }

    fn decode(&self, ctx: &mut ReadContext<'_>) -> CodecResult<ModuleIdentifier> {
        let decoder = ctx.decoder();
        let group = decoder.read_string()?;
        let name = decoder.read_string()?;
        Ok(ModuleIdentifier::new(group, name))
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct ModuleVersionIdentifierCodec;

impl Codec for ModuleVersionIdentifierCodec {
    type Value = ModuleVersionIdentifier;

    fn encode(&self, ctx: &mut WriteContext, value: &ModuleVersionIdentifier) -> CodecResult<()> {
        let encoder = ctx.encoder();
        encoder.write_str(value.group());
        encoder.write_str(value.name());
        encoder.write_str(&value.version);
        Ok(())
    }

    fn decode(&self, ctx: &mut ReadContext<'_>) -> CodecResult<ModuleVersionIdentifier> {
        let decoder = ctx.decoder();
        let group = decoder.read_string()?;
        let name = decoder.read_string()?;
        let version = decoder.read_string()?;
        Ok(ModuleVersionIdentifier::new(group, name, version))
    }
}

const MODULE_COMPONENT: u8 = 0;
const PROJECT_COMPONENT: u8 = 1;

#[derive(Clone, Copy, Debug, Default)]
pub struct ComponentIdentifierCodec;

impl Codec for ComponentIdentifierCodec {
    type Value = ComponentIdentifier;

    fn encode(&self, ctx: &mut WriteContext, value: &ComponentIdentifier) -> CodecResult<()> {
        match value {
            ComponentIdentifier::Module(id) => {
                ctx.encoder().write_u8(MODULE_COMPONENT);
                ctx.write(id)
            }
            ComponentIdentifier::Project {
                build_path,
                project_path,
            } => {
                ctx.encoder().write_u8(PROJECT_COMPONENT);
                ctx.encoder().write_str(&build_path.to_string());
                ctx.write(project_path)
            }
        }
    }

    fn decode(&self, ctx: &mut ReadContext<'_>) -> CodecResult<ComponentIdentifier> {
        let offset = ctx.decoder().position();
        match ctx.decoder().read_u8()? {
            MODULE_COMPONENT => Ok(ComponentIdentifier::Module(ctx.read()?)),
            PROJECT_COMPONENT => {
                let build_path = ProjectPath::parse(ctx.decoder().read_str()?)?;
                let project_path = ctx.read()?;
                Ok(ComponentIdentifier::Project {
                    build_path,
                    project_path,
                })
            }
            other => Err(CodecError::corrupt(
                offset,
                format!("unknown component identifier variant {other}"),
            )),
        }
    }
}

/// Writes the component identity and module version only. Status and
/// attribute schema come back as defaults.
#[derive(Clone, Copy, Debug, Default)]
pub struct LocalComponentMetadataCodec;

impl Codec for LocalComponentMetadataCodec {
    type Value = LocalComponentMetadata;

    fn encode(&self, ctx: &mut WriteContext, value: &LocalComponentMetadata) -> CodecResult<()> {
        ctx.write(&value.id)?;
        ctx.write(&value.module_version_id)
    }

    fn decode(&self, ctx: &mut ReadContext<'_>) -> CodecResult<LocalComponentMetadata> {
        let id = ctx.read()?;
        let module_version_id = ctx.read()?;
        Ok(LocalComponentMetadata::new(id, module_version_id))
    }
}

/// Live project objects: only the path is stored, the handle is looked up
/// in the running build on read.
#[derive(Clone, Copy, Debug, Default)]
pub struct ProjectHandleCodec;

impl Codec for ProjectHandleCodec {
    type Value = Arc<ProjectHandle>;

    fn encode(&self, ctx: &mut WriteContext, value: &Arc<ProjectHandle>) -> CodecResult<()> {
        ctx.write(&value.path)
    }

    fn decode(&self, ctx: &mut ReadContext<'_>) -> CodecResult<Arc<ProjectHandle>> {
        let path: ProjectPath = ctx.read()?;
        ctx.host()
            .project(&path)
            .ok_or(CodecError::UnresolvedProject { path })
    }
}

/// The default codec set.
#[derive(Clone, Debug)]
pub struct Codecs {
    user_types: Arc<CodecRegistry>,
}

impl Codecs {
    pub fn new() -> CodecResult<Self> {
        Ok(Self {
            user_types: Self::user_types_builder()?.build(),
        })
    }

    /// A builder pre-populated with every built-in codec, for callers that
    /// register codecs of their own on top.
    pub fn user_types_builder() -> CodecResult<CodecRegistryBuilder> {
        let mut builder = CodecRegistry::builder();
        builder
            .register(tags::STRING, StringCodec)?
            .register(tags::BOOL, BoolCodec)?
            .register(tags::U32, U32Codec)?
            .register(tags::U64, U64Codec)?
            .register(tags::I64, I64Codec)?
            .register(tags::BYTES, BytesCodec)?
            .register(tags::PROJECT_PATH, ProjectPathCodec)?
            .register(tags::STATE_TYPE, StateTypeCodec)?
            .register(tags::MODULE_ID, ModuleIdentifierCodec)?
            .register(tags::MODULE_VERSION_ID, ModuleVersionIdentifierCodec)?
            .register(tags::COMPONENT_ID, ComponentIdentifierCodec)?
            .register(tags::LOCAL_COMPONENT_METADATA, LocalComponentMetadataCodec)?
            .register(tags::PROJECT_HANDLE, ProjectHandleCodec)?;
        Ok(builder)
    }

    /// Codecs for every built-in user type.
    pub fn user_types(&self) -> Arc<CodecRegistry> {
        Arc::clone(&self.user_types)
    }

    pub fn tag_of<T: std::any::Any>(&self) -> Option<TypeTag> {
        self.user_types.tag_of::<T>()
    }
}

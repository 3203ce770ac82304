use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use roxmltree::{Document, Node};
use tracing::info;

use crate::coord::Dimension;
use crate::tile::Tile;

use super::effects::EffectKind;
use super::registry::ContentRegistry;
use super::types::{ContentCategory, ContentDefinition, RegistryError, RegistryStats, SpawnRule};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceLocation {
    pub line: usize,
    pub column: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentErrorCode {
    ReadFile,
    XmlMalformed,
    InvalidRoot,
    UnknownDefType,
    UnknownField,
    DuplicateField,
    MissingField,
    InvalidValue,
    DuplicateRegistration,
}

#[derive(Debug, Clone)]
pub struct ContentLoadError {
    pub code: ContentErrorCode,
    pub message: String,
    pub file_path: PathBuf,
    pub location: Option<SourceLocation>,
}

impl fmt::Display for ContentLoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.location {
            Some(loc) => write!(
                f,
                "{:?}: {} (file={}, line={}, column={})",
                self.code,
                self.message,
                self.file_path.display(),
                loc.line,
                loc.column
            ),
            None => write!(
                f,
                "{:?}: {} (file={})",
                self.code,
                self.message,
                self.file_path.display()
            ),
        }
    }
}

impl std::error::Error for ContentLoadError {}

/// Compiles every `*.xml` under `dir` (sorted by relative path) into the
/// registry. Any malformed definition aborts the whole load.
pub fn load_content_dir(
    dir: &Path,
    registry: &mut ContentRegistry,
) -> Result<RegistryStats, ContentLoadError> {
    let files = collect_xml_files_sorted(dir).map_err(|error| read_error(error.path, error.source))?;
    let before = registry.stats();

    for file in &files {
        let raw =
            fs::read_to_string(file).map_err(|source| read_error(file.clone(), source))?;
        load_content_document(file, &raw, registry)?;
    }

    let after = registry.stats();
    let added = RegistryStats {
        items: after.items - before.items,
        npcs: after.npcs - before.npcs,
        enemies: after.enemies - before.enemies,
    };
    info!(
        dir = %dir.display(),
        xml_file_count = files.len(),
        items = added.items,
        npcs = added.npcs,
        enemies = added.enemies,
        "content_defs_loaded"
    );
    Ok(added)
}

pub fn load_content_document(
    file_path: &Path,
    raw: &str,
    registry: &mut ContentRegistry,
) -> Result<(), ContentLoadError> {
    let doc = Document::parse(raw).map_err(|error| ContentLoadError {
        code: ContentErrorCode::XmlMalformed,
        message: format!("malformed XML: {error}"),
        file_path: file_path.to_path_buf(),
        location: Some(SourceLocation {
            line: error.pos().row as usize,
            column: error.pos().col as usize,
        }),
    })?;

    let root = doc.root_element();
    if root.tag_name().name() != "Defs" {
        return Err(error_at_node(
            ContentErrorCode::InvalidRoot,
            "root element must be <Defs>".to_string(),
            file_path,
            &doc,
            root,
        ));
    }

    for child in root.children().filter(|node| node.is_element()) {
        let category = match child.tag_name().name() {
            "ItemDef" => ContentCategory::Item,
            "NpcDef" => ContentCategory::Npc,
            "EnemyDef" => ContentCategory::Enemy,
            other => {
                return Err(error_at_node(
                    ContentErrorCode::UnknownDefType,
                    format!("unsupported def type <{other}>; expected ItemDef, NpcDef or EnemyDef"),
                    file_path,
                    &doc,
                    child,
                ))
            }
        };
        let def = parse_def(category, file_path, &doc, child)?;
        registry.register(category, def).map_err(|error| {
            let code = match error {
                RegistryError::DuplicateRegistration { .. } => {
                    ContentErrorCode::DuplicateRegistration
                }
                RegistryError::EmptyId { .. } | RegistryError::CategoryMismatch { .. } => {
                    ContentErrorCode::InvalidValue
                }
            };
            error_at_node(code, error.to_string(), file_path, &doc, child)
        })?;
    }

    Ok(())
}

fn parse_def(
    category: ContentCategory,
    file_path: &Path,
    doc: &Document<'_>,
    node: Node<'_, '_>,
) -> Result<ContentDefinition, ContentLoadError> {
    let def_tag = node.tag_name().name();
    let mut seen_fields = HashSet::<String>::new();
    let mut id: Option<String> = None;
    let mut tile: Option<Tile> = None;
    let mut stackable = false;
    let mut spawn_weight = 1u32;
    let mut rule = SpawnRule::default();
    let mut effect: Option<EffectKind> = None;
    let mut tooltip: Option<String> = None;
    let mut tags = Vec::<String>::new();

    for field in node.children().filter(|child| child.is_element()) {
        let field_name = field.tag_name().name().to_string();
        if !seen_fields.insert(field_name.clone()) {
            return Err(error_at_node(
                ContentErrorCode::DuplicateField,
                format!("duplicate field <{field_name}> in <{def_tag}>"),
                file_path,
                doc,
                field,
            ));
        }
        let invalid = |message: String| {
            error_at_node(ContentErrorCode::InvalidValue, message, file_path, doc, field)
        };

        match field_name.as_str() {
            "id" => id = Some(required_text(file_path, doc, field, "id")?),
            "tile" => {
                tile = Some(Tile::from_tag(&required_text(file_path, doc, field, "tile")?))
            }
            "stackable" => {
                let value = required_text(file_path, doc, field, "stackable")?;
                stackable = parse_bool(&value)
                    .ok_or_else(|| invalid(format!("stackable '{value}' is not true/false")))?;
            }
            "spawnWeight" => {
                let value = required_text(file_path, doc, field, "spawnWeight")?;
                spawn_weight = value
                    .parse::<u32>()
                    .map_err(|_| invalid(format!("spawnWeight '{value}' is not a whole number")))?;
            }
            "minLevel" | "maxLevel" => {
                let value = required_text(file_path, doc, field, &field_name)?;
                let level = value
                    .parse::<u8>()
                    .map_err(|_| invalid(format!("{field_name} '{value}' is not a level")))?;
                if field_name == "minLevel" {
                    rule.min_level = level;
                } else {
                    rule.max_level = level;
                }
            }
            "dimensions" => {
                let value = required_text(file_path, doc, field, "dimensions")?;
                let mut dimensions = Vec::new();
                for token in value.split(',').map(str::trim).filter(|t| !t.is_empty()) {
                    let dimension = Dimension::from_token(token).ok_or_else(|| {
                        invalid(format!(
                            "unknown dimension '{token}'; allowed values: surface, interior, underground"
                        ))
                    })?;
                    dimensions.push(dimension);
                }
                rule.dimensions = dimensions;
            }
            "requiresActivation" => {
                let value = required_text(file_path, doc, field, "requiresActivation")?;
                rule.requires_activation = parse_bool(&value).ok_or_else(|| {
                    invalid(format!("requiresActivation '{value}' is not true/false"))
                })?;
            }
            "effect" => {
                let value = required_text(file_path, doc, field, "effect")?;
                effect = Some(
                    value
                        .parse::<EffectKind>()
                        .map_err(|error| invalid(error.to_string()))?,
                );
            }
            "tooltip" => tooltip = Some(required_text(file_path, doc, field, "tooltip")?),
            "tags" => {
                tags = field
                    .text()
                    .unwrap_or_default()
                    .split(',')
                    .map(str::trim)
                    .filter(|tag| !tag.is_empty())
                    .map(ToString::to_string)
                    .collect();
            }
            _ => {
                return Err(error_at_node(
                    ContentErrorCode::UnknownField,
                    format!("unknown field <{field_name}> in <{def_tag}>"),
                    file_path,
                    doc,
                    field,
                ))
            }
        }
    }

    let Some(id) = id else {
        return Err(error_at_node(
            ContentErrorCode::MissingField,
            format!("missing required field <id> in <{def_tag}>"),
            file_path,
            doc,
            node,
        ));
    };
    if rule.min_level > rule.max_level {
        return Err(error_at_node(
            ContentErrorCode::InvalidValue,
            format!("minLevel {} exceeds maxLevel {}", rule.min_level, rule.max_level),
            file_path,
            doc,
            node,
        ));
    }

    let mut def = ContentDefinition::new(id, category);
    if let Some(tile) = tile {
        def.tile = tile;
    }
    def.stackable = stackable;
    def.spawn_weight = spawn_weight;
    def.spawn_rule = rule;
    def.effect = effect;
    def.tooltip = tooltip;
    def.tags = tags;
    Ok(def)
}

fn parse_bool(value: &str) -> Option<bool> {
    match value {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}

fn required_text(
    file_path: &Path,
    doc: &Document<'_>,
    node: Node<'_, '_>,
    field_name: &str,
) -> Result<String, ContentLoadError> {
    let value = node.text().map(str::trim).unwrap_or_default().to_string();
    if value.is_empty() {
        return Err(error_at_node(
            ContentErrorCode::MissingField,
            format!("field <{field_name}> must not be empty"),
            file_path,
            doc,
            node,
        ));
    }
    Ok(value)
}

fn error_at_node(
    code: ContentErrorCode,
    message: String,
    file_path: &Path,
    doc: &Document<'_>,
    node: Node<'_, '_>,
) -> ContentLoadError {
    let pos = doc.text_pos_at(node.range().start);
    ContentLoadError {
        code,
        message,
        file_path: file_path.to_path_buf(),
        location: Some(SourceLocation {
            line: pos.row as usize,
            column: pos.col as usize,
        }),
    }
}

struct ReadError {
    path: PathBuf,
    source: std::io::Error,
}

fn collect_xml_files_sorted(root: &Path) -> Result<Vec<PathBuf>, ReadError> {
    let mut files = Vec::<PathBuf>::new();
    collect_recursive(root, &mut files)?;
    files.sort_by_key(|path| normalize_rel_path(path.strip_prefix(root).unwrap_or(path)));
    Ok(files)
}

fn collect_recursive(current: &Path, files: &mut Vec<PathBuf>) -> Result<(), ReadError> {
    let entries = fs::read_dir(current).map_err(|source| ReadError {
        path: current.to_path_buf(),
        source,
    })?;
    for entry in entries {
        let path = entry
            .map_err(|source| ReadError {
                path: current.to_path_buf(),
                source,
            })?
            .path();
        if path.is_dir() {
            collect_recursive(&path, files)?;
        } else if path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("xml"))
        {
            files.push(path);
        }
    }
    Ok(())
}

fn normalize_rel_path(path: &Path) -> String {
    path.components()
        .map(|component| component.as_os_str().to_string_lossy().to_string())
        .collect::<Vec<_>>()
        .join("/")
}

fn read_error(path: PathBuf, source: std::io::Error) -> ContentLoadError {
    ContentLoadError {
        code: ContentErrorCode::ReadFile,
        message: format!("failed to read content path: {source}"),
        file_path: path,
        location: None,
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::content::types::Activation;

    fn write_file(path: &Path, content: &str) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("mkdir");
        }
        fs::write(path, content).expect("write");
    }

    #[test]
    fn loads_all_three_categories() {
        let temp = TempDir::new().expect("temp");
        write_file(
            &temp.path().join("defs.xml"),
            r#"<Defs>
                <ItemDef><id>food</id><spawnWeight>5</spawnWeight><effect>food:10</effect><tags>food</tags></ItemDef>
                <NpcDef><id>hermit</id></NpcDef>
                <EnemyDef><id>mole</id><dimensions>underground</dimensions><minLevel>2</minLevel></EnemyDef>
            </Defs>"#,
        );
        let mut registry = ContentRegistry::new();
        let added = load_content_dir(temp.path(), &mut registry).expect("load");
        assert_eq!(added, RegistryStats { items: 1, npcs: 1, enemies: 1 });

        let food = registry.get(ContentCategory::Item, "food").expect("food");
        assert_eq!(food.spawn_weight, 5);
        assert_eq!(food.effect, Some(EffectKind::Food { hunger: 10 }));
        assert!(food.has_tag("food"));
        assert_eq!(food.tile, Tile::item("food"));

        let mole = registry.get(ContentCategory::Enemy, "mole").expect("mole");
        assert!(!mole.spawn_rule.allows(2, Dimension::Surface, Activation::Dormant));
        assert!(mole.spawn_rule.allows(2, Dimension::Underground, Activation::Dormant));
    }

    #[test]
    fn duplicate_id_across_files_is_a_registration_error() {
        let temp = TempDir::new().expect("temp");
        write_file(
            &temp.path().join("a.xml"),
            r#"<Defs><ItemDef><id>food</id></ItemDef></Defs>"#,
        );
        write_file(
            &temp.path().join("nested").join("b.xml"),
            r#"<Defs><ItemDef><id>food</id></ItemDef></Defs>"#,
        );
        let mut registry = ContentRegistry::new();
        let err = load_content_dir(temp.path(), &mut registry).expect_err("dup");
        assert_eq!(err.code, ContentErrorCode::DuplicateRegistration);
        assert!(err.file_path.ends_with(Path::new("nested").join("b.xml")));
    }

    #[test]
    fn missing_id_reports_location() {
        let mut registry = ContentRegistry::new();
        let err = load_content_document(
            Path::new("defs.xml"),
            r#"<Defs><ItemDef><spawnWeight>2</spawnWeight></ItemDef></Defs>"#,
            &mut registry,
        )
        .expect_err("err");
        assert_eq!(err.code, ContentErrorCode::MissingField);
        assert!(err.location.is_some());
    }

    #[test]
    fn unknown_field_and_bad_values_error() {
        let mut registry = ContentRegistry::new();
        let unknown = load_content_document(
            Path::new("defs.xml"),
            r#"<Defs><ItemDef><id>a</id><mood>happy</mood></ItemDef></Defs>"#,
            &mut registry,
        )
        .expect_err("unknown");
        assert_eq!(unknown.code, ContentErrorCode::UnknownField);

        let bad_dimension = load_content_document(
            Path::new("defs.xml"),
            r#"<Defs><ItemDef><id>b</id><dimensions>sky</dimensions></ItemDef></Defs>"#,
            &mut registry,
        )
        .expect_err("dimension");
        assert_eq!(bad_dimension.code, ContentErrorCode::InvalidValue);

        let inverted = load_content_document(
            Path::new("defs.xml"),
            r#"<Defs><ItemDef><id>c</id><minLevel>4</minLevel><maxLevel>2</maxLevel></ItemDef></Defs>"#,
            &mut registry,
        )
        .expect_err("levels");
        assert_eq!(inverted.code, ContentErrorCode::InvalidValue);
    }

    #[test]
    fn malformed_xml_and_wrong_root_error() {
        let mut registry = ContentRegistry::new();
        let malformed = load_content_document(
            Path::new("defs.xml"),
            r#"<Defs><ItemDef><id>a</id></Defs>"#,
            &mut registry,
        )
        .expect_err("malformed");
        assert_eq!(malformed.code, ContentErrorCode::XmlMalformed);

        let root = load_content_document(Path::new("defs.xml"), "<Items/>", &mut registry)
            .expect_err("root");
        assert_eq!(root.code, ContentErrorCode::InvalidRoot);
    }
}

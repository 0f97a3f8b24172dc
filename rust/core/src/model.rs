// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Model - one tape plus the line directory that indexes it

use nalgebra::Matrix4;

use crate::codec::{decode_line, encode_line, Line};
use crate::directory::{LineDirectory, LineEntry};
use crate::error::{Error, Result};
use crate::parser::{StepReader, Token};
use crate::schema::TypeCatalog;
use crate::tape::{TokenSink, TokenStream, DEFAULT_PAGE_SIZE};
use crate::value::ArgumentValue;

/// Column-major 4x4 transform applied to a model's geometry
pub type Transform = Matrix4<f64>;

/// Settings applied to every model a registry opens
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelConfig {
    /// Tape page size in bytes
    pub page_size: usize,
    /// Skip entities whose type the catalog does not know instead of failing
    pub skip_unknown_types: bool,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            skip_unknown_types: false,
        }
    }
}

/// Counters gathered while loading a file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadStats {
    pub statements: usize,
    pub skipped_unknown: usize,
    pub duplicates: usize,
}

/// An open model: token tape, line directory and per-model settings
#[derive(Debug)]
pub struct Model {
    tape: TokenStream,
    directory: LineDirectory,
    header: Option<String>,
    transformation: Transform,
    /// Scratch buffer a rewritten line is encoded into before it is committed
    staging: Vec<u8>,
}

impl Model {
    /// Create an empty model
    pub fn new(config: &ModelConfig) -> Self {
        Self {
            tape: TokenStream::with_page_size(config.page_size),
            directory: LineDirectory::new(),
            header: None,
            transformation: Transform::identity(),
            staging: Vec::new(),
        }
    }

    /// Tokenize a STEP file into a new model
    pub fn load<C: TypeCatalog + ?Sized>(
        content: &str,
        catalog: &C,
        config: &ModelConfig,
    ) -> Result<(Self, LoadStats)> {
        let mut model = Self::new(config);
        let mut stats = LoadStats::default();
        let mut reader = StepReader::new(content);
        model.header = reader.header().map(str::to_owned);

        while let Some(statement) = reader.next_entity() {
            let statement = statement?;
            stats.statements += 1;

            let Some(type_code) = catalog.code_of(statement.type_name) else {
                if config.skip_unknown_types {
                    tracing::warn!(
                        id = statement.id,
                        type_name = statement.type_name,
                        "Skipping entity of unknown type"
                    );
                    stats.skipped_unknown += 1;
                    continue;
                }
                return Err(Error::parse(
                    statement.position,
                    format!("unknown entity type {}", statement.type_name),
                ));
            };

            let position = statement.position;
            let id = statement.id;
            let arguments = ArgumentValue::from_token(&Token::List(statement.arguments))
                .map_err(|e| Error::parse(position, format!("#{}: {}", id, e)))?;

            if model.directory.contains(id) {
                tracing::warn!(id, "Duplicate entity identifier, later statement wins");
                stats.duplicates += 1;
            }

            // Parse-time lines stream straight onto the tape; a failure drops
            // the whole model so nothing partial is ever visible.
            let type_name = catalog.name_of(type_code).unwrap_or(statement.type_name);
            let offset = model.tape.write_position();
            encode_line(&mut model.tape, id, type_name, &arguments)
                .map_err(|e| Error::parse(position, format!("#{}: {}", id, e)))?;
            model.directory.record_line(id, type_code, offset);
        }

        Ok((model, stats))
    }

    /// Decode one line by identifier
    pub fn get_line(&mut self, id: u32) -> Result<Line> {
        let entry = *self.directory.lookup(id)?;
        decode_line(&mut self.tape, &entry)
    }

    /// Append a new version of a line and point the directory at it.
    ///
    /// The line is staged first; the tape and directory are only touched
    /// once the whole argument tree encoded successfully.
    pub fn write_line<C: TypeCatalog + ?Sized>(
        &mut self,
        catalog: &C,
        id: u32,
        type_code: u32,
        arguments: &ArgumentValue,
    ) -> Result<()> {
        let type_name = catalog
            .name_of(type_code)
            .ok_or(Error::UnknownTypeCode(type_code))?;

        self.staging.clear();
        encode_line(&mut self.staging, id, type_name, arguments)?;

        let offset = self.tape.write_position();
        self.tape.push_bytes(&self.staging);
        self.directory.record_line(id, type_code, offset);
        tracing::debug!(id, type_code, offset, bytes = self.staging.len(), "Wrote line");
        Ok(())
    }

    /// Remove a line from lookups and enumeration; its tape bytes stay
    pub fn delete_line(&mut self, id: u32) -> Result<()> {
        self.directory.remove(id).map(|_| ())
    }

    /// Type code of a live line
    pub fn line_type(&self, id: u32) -> Result<u32> {
        self.directory.lookup(id).map(|entry| entry.type_code)
    }

    pub fn contains(&self, id: u32) -> bool {
        self.directory.contains(id)
    }

    /// Live identifiers in directory order
    pub fn all_identifiers(&self) -> impl Iterator<Item = u32> + '_ {
        self.directory.all_identifiers()
    }

    pub fn identifiers_of_type(&self, type_code: u32) -> impl Iterator<Item = u32> + '_ {
        self.directory.identifiers_of_type(type_code)
    }

    /// Decode every live line in directory order
    pub fn lines(&mut self) -> Lines<'_> {
        Lines {
            entries: self.directory.slots().iter(),
            tape: &mut self.tape,
        }
    }

    /// One past the largest identifier ever recorded
    pub fn next_identifier(&self) -> Option<u32> {
        self.directory.max_id().checked_add(1)
    }

    pub fn line_count(&self) -> usize {
        self.directory.len()
    }

    /// Bytes on the tape, including superseded line versions
    pub fn tape_len(&self) -> usize {
        self.tape.len()
    }

    /// HEADER section text captured at load time
    pub fn header(&self) -> Option<&str> {
        self.header.as_deref()
    }

    pub fn directory(&self) -> &LineDirectory {
        &self.directory
    }

    /// Set the transform geometry queries for this model apply.
    /// `m` is column-major, matching the usual 4x4 interchange layout.
    pub fn set_geometry_transformation(&mut self, m: [f64; 16]) {
        self.transformation = Transform::from_column_slice(&m);
    }

    pub fn geometry_transformation(&self) -> &Transform {
        &self.transformation
    }
}

/// Iterator returned by [`Model::lines`]
pub struct Lines<'a> {
    entries: std::slice::Iter<'a, LineEntry>,
    tape: &'a mut TokenStream,
}

impl Iterator for Lines<'_> {
    type Item = Result<Line>;

    fn next(&mut self) -> Option<Self::Item> {
        let entry = self.entries.by_ref().find(|entry| entry.live)?;
        Some(decode_line(self.tape, entry))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{IfcSchema, IfcType};

    const CONTENT: &str = r#"
#1=IFCPROJECT('2vqT3bvqj9RBFjLlXpN8n9',$,$,$,$,$,$,$,$);
#2=IFCWALL('3a4T3bvqj9RBFjLlXpN8n0',$,$,$,'Wall-001',$,#3,#4);
#3=IFCLOCALPLACEMENT($,#4);
#4=IFCAXIS2PLACEMENT3D(#5,$,$);
#5=IFCCARTESIANPOINT((0.,0.,0.));
"#;

    fn load(content: &str) -> Model {
        let (model, _) = Model::load(content, &IfcSchema::new(), &ModelConfig::default()).unwrap();
        model
    }

    #[test]
    fn test_load_and_get_line() {
        let mut model = load(CONTENT);
        assert_eq!(model.line_count(), 5);

        let wall = model.get_line(2).unwrap();
        assert_eq!(wall.type_code, IfcType::IfcWall.code());
        assert_eq!(wall.len(), 8);
        assert_eq!(wall.get_string(4), Some("Wall-001"));
        assert_eq!(wall.get_ref(6), Some(3));
        assert_eq!(wall.get_ref(7), Some(4));

        let point = model.get_line(5).unwrap();
        assert_eq!(
            point.get(0),
            Some(&ArgumentValue::List(vec![
                ArgumentValue::Real(0.0),
                ArgumentValue::Real(0.0),
                ArgumentValue::Real(0.0)
            ]))
        );
    }

    #[test]
    fn test_random_access_order_independent() {
        let mut model = load(CONTENT);
        let last = model.get_line(5).unwrap();
        let first = model.get_line(1).unwrap();
        assert_eq!(first.type_code, IfcType::IfcProject.code());
        assert_eq!(model.get_line(5).unwrap(), last);
    }

    #[test]
    fn test_write_line_appends() {
        let schema = IfcSchema::new();
        let mut model = load(CONTENT);
        let before = model.tape_len();

        let args = ArgumentValue::List(vec![ArgumentValue::Null, ArgumentValue::Reference(5)]);
        model
            .write_line(&schema, 3, IfcType::IfcLocalPlacement.code(), &args)
            .unwrap();

        assert!(model.tape_len() > before);
        assert_eq!(model.line_count(), 5);
        assert_eq!(model.get_line(3).unwrap().arguments, args);
        // Directory order is unchanged by a rewrite
        assert_eq!(model.all_identifiers().collect::<Vec<_>>(), vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_failed_write_leaves_model_untouched() {
        let schema = IfcSchema::new();
        let mut model = load(CONTENT);
        let before = model.tape_len();

        let args = ArgumentValue::List(vec![ArgumentValue::string("x".repeat(300))]);
        let err = model.write_line(&schema, 2, IfcType::IfcWall.code(), &args);
        assert!(matches!(err, Err(Error::UnsupportedValue(_))));
        assert_eq!(model.tape_len(), before);
        assert_eq!(model.get_line(2).unwrap().get_string(4), Some("Wall-001"));

        let err = model.write_line(&schema, 50, IfcType::IfcWall.code(), &args);
        assert!(err.is_err());
        assert!(!model.contains(50));

        let err = model.write_line(&schema, 51, 12345, &ArgumentValue::List(vec![]));
        assert_eq!(err, Err(Error::UnknownTypeCode(12345)));
        assert!(!model.contains(51));
    }

    #[test]
    fn test_unknown_type_policy() {
        let content = "#1=IFCWALL($);\n#2=IFCSOMETHINGNEW($);\n#3=IFCDOOR($);\n";
        let schema = IfcSchema::new();

        let err = Model::load(content, &schema, &ModelConfig::default()).unwrap_err();
        assert!(matches!(err, Error::Parse { position: 15, .. }));

        let config = ModelConfig {
            skip_unknown_types: true,
            ..ModelConfig::default()
        };
        let (model, stats) = Model::load(content, &schema, &config).unwrap();
        assert_eq!(stats.statements, 3);
        assert_eq!(stats.skipped_unknown, 1);
        assert_eq!(model.all_identifiers().collect::<Vec<_>>(), vec![1, 3]);
    }

    #[test]
    fn test_duplicate_identifier_later_wins() {
        let content = "#1=IFCWALL('a');\n#1=IFCDOOR('b');\n";
        let (mut model, stats) =
            Model::load(content, &IfcSchema::new(), &ModelConfig::default()).unwrap();
        assert_eq!(stats.duplicates, 1);
        assert_eq!(model.line_count(), 1);
        let line = model.get_line(1).unwrap();
        assert_eq!(line.type_code, IfcType::IfcDoor.code());
        assert_eq!(line.get_string(0), Some("b"));
    }

    #[test]
    fn test_long_string_in_source_is_parse_error() {
        let content = format!("#1=IFCWALL('{}');", "w".repeat(256));
        let err = Model::load(&content, &IfcSchema::new(), &ModelConfig::default()).unwrap_err();
        assert!(matches!(err, Error::Parse { position: 0, .. }));
    }

    #[test]
    fn test_delete_and_lines_iterator() {
        let mut model = load(CONTENT);
        model.delete_line(3).unwrap();
        assert_eq!(model.delete_line(3), Err(Error::NotFound(3)));
        assert_eq!(model.get_line(3), Err(Error::NotFound(3)));

        let ids: Vec<u32> = model.lines().map(|line| line.unwrap().id).collect();
        assert_eq!(ids, vec![1, 2, 4, 5]);
        assert_eq!(model.next_identifier(), Some(6));
    }

    #[test]
    fn test_small_pages() {
        let config = ModelConfig {
            page_size: 16,
            ..ModelConfig::default()
        };
        let (mut model, _) = Model::load(CONTENT, &IfcSchema::new(), &config).unwrap();
        assert_eq!(model.get_line(1).unwrap().get_string(0), Some("2vqT3bvqj9RBFjLlXpN8n9"));
        assert_eq!(model.get_line(2).unwrap().get_string(4), Some("Wall-001"));
    }

    #[test]
    fn test_geometry_transformation() {
        let mut model = Model::new(&ModelConfig::default());
        assert_eq!(*model.geometry_transformation(), Matrix4::identity());

        let mut m = [0.0; 16];
        m[0] = 1.0;
        m[5] = 1.0;
        m[10] = 1.0;
        m[15] = 1.0;
        m[12] = 10.0; // x translation in column-major layout
        model.set_geometry_transformation(m);
        approx::assert_relative_eq!(model.geometry_transformation()[(0, 3)], 10.0);
        approx::assert_relative_eq!(model.geometry_transformation()[(3, 0)], 0.0);
    }
}

//! `.proto` text rendering.

use crate::naming::escape_string;
use crate::proto::model::{
    Definition, FieldSlot, GeneratedEnum, GeneratedFile, GeneratedMessage, OneofGroup,
};
use crate::proto::GeneratorConfig;
use std::fmt::Write as FmtWrite;

/// Writes a [`GeneratedFile`] as proto2 text
pub(crate) struct TextRenderer<'a, W: FmtWrite> {
    writer: &'a mut W,
    config: &'a GeneratorConfig,
    indent_level: usize,
}

impl<'a, W: FmtWrite> TextRenderer<'a, W> {
    pub(crate) fn new(writer: &'a mut W, config: &'a GeneratorConfig) -> Self {
        Self {
            writer,
            config,
            indent_level: 0,
        }
    }

    fn indent(&mut self) {
        self.indent_level += 1;
    }

    fn dedent(&mut self) {
        self.indent_level = self.indent_level.saturating_sub(1);
    }

    fn write_indent(&mut self) -> std::fmt::Result {
        for _ in 0..self.indent_level {
            write!(self.writer, "{}", self.config.indent_str)?;
        }
        Ok(())
    }

    fn writeln(&mut self, s: &str) -> std::fmt::Result {
        self.write_indent()?;
        writeln!(self.writer, "{}", s)
    }

    /// `// serial name '...'` above an identifier that differs from its source name
    fn write_serial_name(&mut self, serial_name: Option<&str>) -> std::fmt::Result {
        match serial_name {
            Some(original) if self.config.include_comments => {
                self.write_indent()?;
                writeln!(self.writer, "// serial name '{}'", escape_string(original))
            }
            _ => Ok(()),
        }
    }

    pub(crate) fn write_file(&mut self, file: &GeneratedFile) -> std::fmt::Result {
        writeln!(self.writer, "syntax = \"proto2\";")?;
        writeln!(self.writer)?;
        writeln!(self.writer, "package {};", file.package)?;

        if !file.options.is_empty() {
            writeln!(self.writer)?;
            for option in &file.options {
                writeln!(
                    self.writer,
                    "option {} = \"{}\";",
                    option.key,
                    escape_string(&option.value)
                )?;
            }
        }

        for definition in &file.definitions {
            writeln!(self.writer)?;
            self.write_definition(definition)?;
        }

        Ok(())
    }

    fn write_definition(&mut self, definition: &Definition) -> std::fmt::Result {
        match definition {
            Definition::Message(message) => self.write_message(message),
            Definition::Enum(enum_type) => self.write_enum(enum_type),
        }
    }

    fn write_message(&mut self, message: &GeneratedMessage) -> std::fmt::Result {
        self.write_serial_name(message.serial_name.as_deref())?;
        self.write_indent()?;
        writeln!(self.writer, "message {} {{", message.name)?;
        self.indent();

        for field in &message.fields {
            self.write_field(field)?;
        }

        if let Some(oneof) = &message.oneof {
            self.write_oneof(oneof)?;
        }

        let mut wrote_any = !message.fields.is_empty() || message.oneof.is_some();
        for nested in &message.nested {
            if matches!(nested, Definition::Message(m) if m.map_entry)
                && !self.config.emit_map_entries
            {
                continue;
            }
            if wrote_any {
                writeln!(self.writer)?;
            }
            self.write_definition(nested)?;
            wrote_any = true;
        }

        self.dedent();
        self.writeln("}")
    }

    fn write_field(&mut self, field: &FieldSlot) -> std::fmt::Result {
        self.write_serial_name(field.serial_name.as_deref())?;
        self.write_indent()?;
        if let Some(label) = field.label.keyword() {
            write!(self.writer, "{} ", label)?;
        }
        writeln!(
            self.writer,
            "{} {} = {};",
            field.ty.type_name(),
            field.name,
            field.number
        )
    }

    fn write_oneof(&mut self, oneof: &OneofGroup) -> std::fmt::Result {
        self.write_indent()?;
        writeln!(self.writer, "oneof {} {{", oneof.name)?;
        self.indent();

        // Branches carry no label
        for branch in &oneof.branches {
            self.write_serial_name(branch.serial_name.as_deref())?;
            self.write_indent()?;
            writeln!(
                self.writer,
                "{} {} = {};",
                branch.ty.type_name(),
                branch.name,
                branch.number
            )?;
        }

        self.dedent();
        self.writeln("}")
    }

    fn write_enum(&mut self, enum_type: &GeneratedEnum) -> std::fmt::Result {
        self.write_serial_name(enum_type.serial_name.as_deref())?;
        self.write_indent()?;
        writeln!(self.writer, "enum {} {{", enum_type.name)?;
        self.indent();

        for value in &enum_type.values {
            self.write_serial_name(value.serial_name.as_deref())?;
            self.write_indent()?;
            writeln!(self.writer, "{} = {};", value.name, value.number)?;
        }

        self.dedent();
        self.writeln("}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proto::model::{EnumValue, FieldType, FileOption, Label, ScalarType, TypePath};
    use pretty_assertions::assert_eq;

    fn render(file: &GeneratedFile, config: &GeneratorConfig) -> String {
        let mut out = String::new();
        TextRenderer::new(&mut out, config).write_file(file).unwrap();
        out
    }

    fn field(label: Label, ty: FieldType, name: &str, number: u32) -> FieldSlot {
        FieldSlot {
            label,
            ty,
            name: name.to_string(),
            serial_name: None,
            number,
            nullable: false,
            has_default: false,
        }
    }

    fn int32() -> FieldType {
        FieldType::Scalar(ScalarType::Int32)
    }

    #[test]
    fn test_file_layout() {
        let file = GeneratedFile {
            package: "api".to_string(),
            options: vec![FileOption {
                key: "java_package",
                value: "api.proto".to_string(),
            }],
            definitions: vec![
                Definition::Message(GeneratedMessage {
                    name: "A".to_string(),
                    fields: vec![field(Label::Optional, int32(), "i", 1)],
                    ..GeneratedMessage::default()
                }),
                Definition::Enum(GeneratedEnum {
                    name: "E".to_string(),
                    serial_name: None,
                    values: vec![EnumValue {
                        name: "FIRST".to_string(),
                        serial_name: None,
                        number: 0,
                    }],
                }),
            ],
        };

        let expected = "syntax = \"proto2\";\n\
                        \n\
                        package api;\n\
                        \n\
                        option java_package = \"api.proto\";\n\
                        \n\
                        message A {\n  optional int32 i = 1;\n}\n\
                        \n\
                        enum E {\n  FIRST = 0;\n}\n";
        assert_eq!(render(&file, &GeneratorConfig::default()), expected);
    }

    fn map_holder() -> GeneratedFile {
        let map = FieldType::Map {
            key: Box::new(FieldType::Scalar(ScalarType::String)),
            value: Box::new(int32()),
        };
        let entry = GeneratedMessage {
            name: "scoresEntry".to_string(),
            fields: vec![
                field(Label::Optional, FieldType::Scalar(ScalarType::String), "key", 1),
                field(Label::Optional, int32(), "value", 2),
            ],
            map_entry: true,
            ..GeneratedMessage::default()
        };
        GeneratedFile {
            package: "api".to_string(),
            options: Vec::new(),
            definitions: vec![Definition::Message(GeneratedMessage {
                name: "Holder".to_string(),
                fields: vec![field(Label::Map, map, "scores", 1)],
                nested: vec![Definition::Message(entry)],
                ..GeneratedMessage::default()
            })],
        }
    }

    #[test]
    fn test_map_field_and_entry() {
        let expected = "syntax = \"proto2\";\n\npackage api;\n\n\
                        message Holder {\n\
                        \x20 map<string, int32> scores = 1;\n\
                        \n\
                        \x20 message scoresEntry {\n\
                        \x20   optional string key = 1;\n\
                        \x20   optional int32 value = 2;\n\
                        \x20 }\n\
                        }\n";
        assert_eq!(render(&map_holder(), &GeneratorConfig::default()), expected);

        let config = GeneratorConfig::default().emit_map_entries(false);
        let expected = "syntax = \"proto2\";\n\npackage api;\n\n\
                        message Holder {\n  map<string, int32> scores = 1;\n}\n";
        assert_eq!(render(&map_holder(), &config), expected);
    }

    #[test]
    fn test_oneof_and_serial_name_comments() {
        let union = TypePath::root("Holder").child("my_union");
        let file = GeneratedFile {
            package: "api".to_string(),
            options: Vec::new(),
            definitions: vec![Definition::Message(GeneratedMessage {
                name: "my_union".to_string(),
                serial_name: Some("my union".to_string()),
                oneof: Some(OneofGroup {
                    name: "my_union".to_string(),
                    branches: vec![field(
                        Label::Optional,
                        FieldType::Message(union.child("Impl")),
                        "impl",
                        1,
                    )],
                }),
                nested: vec![Definition::Message(GeneratedMessage {
                    name: "Impl".to_string(),
                    ..GeneratedMessage::default()
                })],
                ..GeneratedMessage::default()
            })],
        };

        let expected = "syntax = \"proto2\";\n\npackage api;\n\n\
                        // serial name 'my union'\n\
                        message my_union {\n\
                        \x20 oneof my_union {\n\
                        \x20   my_union.Impl impl = 1;\n\
                        \x20 }\n\
                        \n\
                        \x20 message Impl {\n\
                        \x20 }\n\
                        }\n";
        assert_eq!(render(&file, &GeneratorConfig::default()), expected);

        let plain = render(&file, &GeneratorConfig::default().include_comments(false));
        assert!(!plain.contains("//"));
    }

    #[test]
    fn test_custom_indent() {
        let config = GeneratorConfig::default().indent_str("\t");
        let out = render(&map_holder(), &config.emit_map_entries(false));
        assert!(out.contains("\n\tmap<string, int32> scores = 1;\n"));
    }
}

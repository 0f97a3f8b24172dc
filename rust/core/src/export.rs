// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Export Driver - render a model back to STEP text

use std::fmt::Write;

use crate::error::{Error, Result};
use crate::model::Model;
use crate::schema::TypeCatalog;
use crate::value::{ArgumentValue, TextKind};

const DEFAULT_HEADER: &str = "FILE_DESCRIPTION(('ViewDefinition [CoordinationView]'),'2;1');\n\
FILE_NAME('','',(''),(''),'ifc-tape','ifc-tape','');\n\
FILE_SCHEMA(('IFC4'));";

/// Render every live line of `model`, in directory order, as an exchange file
pub fn export_step<C: TypeCatalog + ?Sized>(model: &mut Model, catalog: &C) -> Result<String> {
    // Roughly the size of the tape; text is a bit longer than tokens
    let mut out = String::with_capacity(model.tape_len() + 256);

    out.push_str("ISO-10303-21;\nHEADER;\n");
    out.push_str(model.header().unwrap_or(DEFAULT_HEADER));
    out.push_str("\nENDSEC;\nDATA;\n");

    for line in model.lines() {
        let line = line?;
        let type_name = catalog
            .name_of(line.type_code)
            .ok_or(Error::UnknownTypeCode(line.type_code))?;
        let _ = write!(out, "#{}={}", line.id, type_name);
        write_value(&mut out, &line.arguments)?;
        out.push_str(";\n");
    }

    out.push_str("ENDSEC;\nEND-ISO-10303-21;\n");
    Ok(out)
}

enum Step<'a> {
    Value(&'a ArgumentValue),
    Raw(&'static str),
}

/// Write one argument value; lists are walked with an explicit stack
pub fn write_value(out: &mut String, value: &ArgumentValue) -> Result<()> {
    let mut stack = vec![Step::Value(value)];

    while let Some(step) = stack.pop() {
        let value = match step {
            Step::Raw(text) => {
                out.push_str(text);
                continue;
            }
            Step::Value(value) => value,
        };

        match value {
            ArgumentValue::Null => out.push('$'),
            ArgumentValue::Unresolved => out.push('*'),
            ArgumentValue::Reference(id) => {
                let _ = write!(out, "#{}", id);
            }
            ArgumentValue::Real(x) => write_real(out, *x)?,
            ArgumentValue::Text {
                value,
                kind: TextKind::String,
            } => {
                out.push('\'');
                out.push_str(&value.replace('\'', "''"));
                out.push('\'');
            }
            ArgumentValue::Text {
                value,
                kind: TextKind::Enum,
            } => {
                let _ = write!(out, ".{}.", value);
            }
            ArgumentValue::Labeled { label, value } => {
                out.push_str(label);
                out.push('(');
                stack.push(Step::Raw(")"));
                stack.push(Step::Value(value));
            }
            ArgumentValue::List(items) => {
                out.push('(');
                stack.push(Step::Raw(")"));
                for (i, item) in items.iter().enumerate().rev() {
                    stack.push(Step::Value(item));
                    if i > 0 {
                        stack.push(Step::Raw(","));
                    }
                }
            }
        }
    }

    Ok(())
}

/// STEP reals always carry a decimal point: `1.`, `0.25`, `1.5E-10`
fn write_real(out: &mut String, x: f64) -> Result<()> {
    if !x.is_finite() {
        return Err(Error::unsupported(format!(
            "{} has no STEP representation",
            x
        )));
    }

    let magnitude = x.abs();
    if x == 0.0 {
        out.push_str("0.");
    } else if (1e-4..1e15).contains(&magnitude) {
        if x.fract() == 0.0 {
            let _ = write!(out, "{}.", x as i64);
        } else {
            let _ = write!(out, "{}", x);
        }
    } else {
        let text = format!("{:E}", x);
        match text.split_once('E') {
            Some((mantissa, exponent)) if !mantissa.contains('.') => {
                let _ = write!(out, "{}.E{}", mantissa, exponent);
            }
            _ => out.push_str(&text),
        }
    }
    Ok(())
}

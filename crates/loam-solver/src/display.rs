//! Readable rendering of types for diagnostics.

use crate::types::TypeData;
use crate::types::TypeId;
use crate::TypeEnv;

pub fn display_type(env: &TypeEnv<'_>, ty: TypeId) -> String {
    match env.types.lookup(ty) {
        TypeData::Primitive(kind) => kind.name().to_string(),
        TypeData::Named { class, args } => {
            let name = env.interner.resolve(env.store.class(class).name);
            if args.is_empty() {
                name.to_string()
            } else {
                let rendered: Vec<String> =
                    args.iter().map(|&a| display_type(env, a)).collect();
                format!("{}<{}>", name, rendered.join(", "))
            }
        }
        TypeData::Array { component } => format!("{}[]", display_type(env, component)),
        TypeData::Placeholder { name, .. } => env.interner.resolve(name).to_string(),
        TypeData::Wildcard { upper, lower } => {
            if let Some(l) = lower {
                format!("? super {}", display_type(env, l))
            } else if let Some(&u) = upper.first() {
                format!("? extends {}", display_type(env, u))
            } else {
                "?".to_string()
            }
        }
        TypeData::Closure { params, ret } => {
            let params = match params {
                None => "...".to_string(),
                Some(ps) => ps
                    .iter()
                    .map(|&p| display_type(env, p))
                    .collect::<Vec<_>>()
                    .join(", "),
            };
            format!("{{ ({}) -> {} }}", params, display_type(env, ret))
        }
        TypeData::Unknown => "<unknown>".to_string(),
    }
}

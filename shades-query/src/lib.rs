//! Shades Query, a query-style shader compiler.
//!
//! Shaders are described on the host side as _queries_: `from` clauses declare what the shader reads (inputs, uniforms,
//! constants), `let` clauses bind intermediate values and a final `select` projects the outputs. The description is an
//! ordinary expression tree ([`Expr`]), built with the [`query`] builder, the operator overloads of [`Expr`] and the
//! stock functions of [`stdlib`]. The [`Compiler`] turns it into shading language source; the current target is
//! [GLSL].
//!
//! ```
//! use shades_query::{
//!   query::{self, Query},
//!   stdlib::{self, Geometry},
//!   types::{FieldDef, StructDef, ToType, Type, V3, V4},
//!   Compiler,
//! };
//!
//! let vertex = Type::structure(StructDef::new("Vertex", vec![
//!   FieldDef::new("position", <V3<f32>>::ty()),
//!   FieldDef::new("normal", <V3<f32>>::ty()),
//! ]));
//! let output = Type::structure(StructDef::new("Output", vec![
//!   FieldDef::new("gl_Position", <V4<f32>>::ty()),
//!   FieldDef::new("shade", f32::ty()),
//! ]));
//!
//! let q = Query::new().from("v", query::inputs_of(vertex));
//! let v = q.var("v");
//! let q = q.bind("n", v.field("normal").normalize());
//! let n = q.var("n");
//! let shader = q.select(query::project(output, vec![
//!   stdlib::vec4(stdlib::swizzle(&v.field("position"), "x"), stdlib::swizzle(&v.field("position"), "y"), 0., 1.),
//!   n.dot(stdlib::vec3(0., 0., 1.)),
//! ]));
//!
//! let glsl = Compiler::default().compile_to_string(&shader).unwrap();
//! assert!(glsl.contains("vec3 n = normalize(normal);"));
//! assert!(glsl.contains("out float shade;"));
//! ```
//!
//! # Templates
//!
//! Operators, calls, member accesses and constructors carry a declaration identity ([`DeclId`]). When the
//! [`SyntaxRegistry`] holds a [`Template`](syntax::Template) for it, the node is written by substituting its arguments
//! into the template; [`SyntaxRegistry::glsl`] comes with the GLSL constructors, builtin functions and swizzles.
//!
//! # Folds
//!
//! [`query::aggregate`] folds the items of a fixed-size array; the fold is written as a counted `for` loop.
//!
//! # User functions
//!
//! [`FunctionDef`](fun::FunctionDef)s are compiled once with [`Compiler::define_function`] and cached. Shaders calling
//! them get them written before the entry point, each after the functions it calls.
//!
//! # Reflection
//!
//! Compiled shaders list their flattened inputs and uniforms ([`FieldPath`](reflect::FieldPath)), whose accessors read
//! the leaves of host values to upload. `#[derive(Struct)]` (feature `derive`, enabled by default) implements
//! [`ToType`](types::ToType) and [`ToValue`](reflect::ToValue) for host structs.
//!
//! [GLSL]: https://www.khronos.org/registry/OpenGL/specs/gl/GLSLangSpec.4.60.pdf

// the derive macros refer to ::shades_query
extern crate self as shades_query;

pub mod compiler;
pub mod decl;
pub mod error;
pub mod expr;
pub mod fun;
pub mod parser;
pub mod query;
pub mod reflect;
pub mod stdlib;
pub mod syntax;
pub mod types;
pub mod writer;

pub use compiler::{CompiledShader, Compiler, Target};
pub use decl::DeclId;
pub use error::{CompileError, CompileResult};
pub use expr::Expr;
pub use syntax::SyntaxRegistry;

#[cfg(feature = "derive")]
pub use shades_query_derive::Struct;

use shades_query::{
  decl,
  expr::Param,
  fun::{FunctionCache, FunctionDef, FunctionRecord},
  query::{self, Query},
  reflect::{FieldCache, ToValue, Value},
  stdlib,
  types::{FieldDef, StructDef, ToType, Type, V3, V4},
  CompileError, Compiler, DeclId, Expr, SyntaxRegistry, Target,
};
use std::{sync::Arc, thread};

fn structure(name: &str, fields: Vec<(&str, Type)>) -> Type {
  Type::structure(StructDef::new(
    name,
    fields
      .into_iter()
      .map(|(name, ty)| FieldDef::new(name, ty))
      .collect(),
  ))
}

fn light() -> Type {
  structure(
    "Light",
    vec![("color", <V3<f32>>::ty()), ("power", f32::ty())],
  )
}

fn scalar_shader(uses: impl FnOnce(Expr) -> Expr) -> Expr {
  let q = Query::new().from(
    "v",
    query::inputs_of(structure("Inputs", vec![("t", f32::ty())])),
  );
  let t = q.var("v").field("t");
  q.select(query::project(
    structure("Outputs", vec![("value", f32::ty())]),
    vec![uses(t)],
  ))
}

#[test]
fn constructor_template() {
  let e = Expr::construct(
    stdlib::VEC3,
    <V3<f32>>::ty(),
    vec![1.0.into(), 2.0.into(), 3.0.into()],
  );

  let compiler = Compiler::default();
  assert_eq!(compiler.compile_expr(&e).unwrap(), "vec3(1.0, 2.0, 3.0)");

  let compiler = Compiler::new(
    SyntaxRegistry::glsl(),
    Target::glsl330().with_float_suffix("f"),
  );
  assert_eq!(compiler.compile_expr(&e).unwrap(), "vec3(1.0f, 2.0f, 3.0f)");
}

#[test]
fn let_binding_then_projection() {
  let vertex = structure(
    "Vertex",
    vec![("a", <V3<f32>>::ty()), ("b", <V3<f32>>::ty())],
  );
  let params = structure("Params", vec![("scale", f32::ty())]);
  let output = structure("Output", vec![("result", <V3<f32>>::ty())]);

  let q = Query::new()
    .from("v", query::inputs_of(vertex))
    .from("u", query::uniforms_of(params));
  let v = q.var("v");
  let q = q.bind("x", v.field("a") + v.field("b"));
  let x = q.var("x");
  let shader = q.select(query::project(output, vec![x]));

  let compiled = Compiler::default().compile(&shader).unwrap();
  let expected = "#version 330 core

in vec3 a;
in vec3 b;
uniform float scale;
out vec3 result;

void main() {
  vec3 x = (a + b);
  result = x;
}
";

  assert_eq!(compiled.source, expected);
  assert_eq!(
    compiled
      .inputs
      .iter()
      .map(|path| path.name.as_str())
      .collect::<Vec<_>>(),
    vec!["a", "b"]
  );
  assert_eq!(compiled.uniforms.len(), 1);
}

#[test]
fn es_preamble() {
  let shader = scalar_shader(|t| t * 2.);
  let compiler = Compiler::new(SyntaxRegistry::glsl(), Target::gles300());
  let expected = "#version 300 es
precision highp float;

in float t;
out float value;

void main() {
  value = (t * 2.0);
}
";

  assert_eq!(compiler.compile_to_string(&shader).unwrap(), expected);
}

#[test]
fn builtin_outputs_are_not_declared() {
  let output = structure(
    "Output",
    vec![
      ("gl_Position", <V4<f32>>::ty()),
      ("depth", f32::ty()),
    ],
  );
  let q = Query::new().from(
    "v",
    query::inputs_of(structure("Vertex", vec![("p", <V3<f32>>::ty())])),
  );
  let p = q.var("v").field("p");
  let shader = q.select(query::project(
    output,
    vec![
      stdlib::vec4(
        stdlib::swizzle(&p, "x"),
        stdlib::swizzle(&p, "y"),
        stdlib::swizzle(&p, "z"),
        1.,
      ),
      stdlib::swizzle(&p, "z"),
    ],
  ));

  let expected = "#version 330 core

in vec3 p;
out float depth;

void main() {
  gl_Position = vec4(p.x, p.y, p.z, 1.0);
  depth = p.z;
}
";

  assert_eq!(
    Compiler::default().compile_to_string(&shader).unwrap(),
    expected
  );
}

#[test]
fn struct_uniforms_and_fold() {
  let params = structure(
    "Params",
    vec![("lights", Type::array(light(), 2)), ("sun", light())],
  );
  let output = structure("Output", vec![("intensity", f32::ty())]);

  let q = Query::new().from("u", query::uniforms_of(params));
  let u = q.var("u");

  let lights = Query::new().from("l", u.field("lights").each());
  let l = lights.var("l");
  let total = query::aggregate(lights.select(l.field("power")), 0., |acc, power| {
    acc + power
  });

  let q = q.bind("total", total);
  let total = q.var("total");
  let shader = q.select(query::project(
    output,
    vec![total + u.field("sun").field("power")],
  ));

  let expected = "#version 330 core

struct Light {
  vec3 color;
  float power;
};
uniform Light lights[2];
uniform Light sun;
out float intensity;

void main() {
  float acc_0 = 0.0;
  for (int idx_1 = 0; idx_1 < 2; idx_1++) {
    Light l = lights[idx_1];
    acc_0 = (acc_0 + l.power);
  }
  float total = acc_0;
  intensity = (total + sun.power);
}
";

  let compiled = Compiler::default().compile(&shader).unwrap();
  assert_eq!(compiled.source, expected);
  assert_eq!(
    compiled
      .uniforms
      .iter()
      .map(|path| path.name.as_str())
      .collect::<Vec<_>>(),
    vec![
      "lights[0].color",
      "lights[0].power",
      "lights[1].color",
      "lights[1].power",
      "sun.color",
      "sun.power"
    ]
  );
}

#[test]
fn unsized_uniform_array() {
  let params = structure("Params", vec![("weights", <Vec<f32>>::ty())]);
  let q = Query::new().from("u", query::uniforms_of(params));
  let shader = q.select(query::project(
    structure("Output", vec![("value", f32::ty())]),
    vec![Expr::from(1.)],
  ));

  match Compiler::default().compile(&shader) {
    Err(CompileError::MissingArrayLengthAnnotation(name)) => assert_eq!(name, "weights"),
    r => panic!("unexpected {:?}", r),
  }
}

#[test]
fn constants() {
  let params = structure(
    "Params",
    vec![("gain", f32::ty()), ("offsets", Type::array(f32::ty(), 2))],
  );
  let value = Value::Struct(vec![
    2f32.to_value(),
    [0.5f32, -0.5].to_value(),
  ]);
  let q = Query::new().from("c", query::constants_of(params, &value).unwrap());
  let c = q.var("c");
  let shader = q.select(query::project(
    structure("Output", vec![("value", f32::ty())]),
    vec![c.field("gain") * c.field("offsets").at(1)],
  ));

  let expected = "#version 330 core

const float gain = 2.0;
const float offsets[2] = float[2](0.5, -0.5);
out float value;

void main() {
  value = (gain * offsets[1]);
}
";

  assert_eq!(
    Compiler::default().compile_to_string(&shader).unwrap(),
    expected
  );
}

fn define_diamond(compiler: &Compiler) -> (FunctionDef, FunctionDef) {
  let x = Param::new("x", f32::ty());

  let k = FunctionDef::new("user::k", "k", vec![x.clone()], x.expr() * 2.);
  compiler.define_function(&k).unwrap();

  let g = FunctionDef::new("user::g", "g", vec![x.clone()], k.call(vec![x.expr()]) + 1.);
  let h = FunctionDef::new("user::h", "h", vec![x.clone()], k.call(vec![x.expr()]) - 1.);
  compiler.define_function(&g).unwrap();
  compiler.define_function(&h).unwrap();

  let f = FunctionDef::new(
    "user::f",
    "f",
    vec![x.clone()],
    g.call(vec![x.expr()]) * h.call(vec![x.expr()]),
  );
  compiler.define_function(&f).unwrap();

  (f, h)
}

#[test]
fn functions_come_after_their_dependencies() {
  let compiler = Compiler::default();
  let (f, h) = define_diamond(&compiler);

  let shader = scalar_shader(|t| f.call(vec![t.clone()]) + h.call(vec![t]));
  let expected = "#version 330 core

in float t;
out float value;

float k(float x) {
  return (x * 2.0);
}

float g(float x) {
  return (k(x) + 1.0);
}

float h(float x) {
  return (k(x) - 1.0);
}

float f(float x) {
  return (g(x) * h(x));
}

void main() {
  value = (f(t) + h(t));
}
";

  assert_eq!(compiler.compile_to_string(&shader).unwrap(), expected);
}

#[test]
fn functions_are_compiled_once() {
  let compiler = Compiler::default();
  let x = Param::new("x", f32::ty());

  let def = FunctionDef::new("user::twice", "twice", vec![x.clone()], x.expr() * 2.);
  let first = compiler.define_function(&def).unwrap();

  let changed = FunctionDef::new("user::twice", "twice", vec![x.clone()], x.expr() * 3.);
  let second = compiler.define_function(&changed).unwrap();

  assert!(std::sync::Arc::ptr_eq(&first, &second));
  assert_eq!(compiler.functions().len(), 1);
}

#[test]
fn function_with_let_clauses() {
  let compiler = Compiler::default();
  let x = Param::new("x", f32::ty());

  let q = Query::new().bind("y", x.expr() * x.expr());
  let y = q.var("y");
  let def = FunctionDef::new("user::sq1", "sq1", vec![x], q.select(y + 1.));
  let record = compiler.define_function(&def).unwrap();

  assert_eq!(
    record.code,
    "float sq1(float x) {\n  float y = (x * x);\n  return (y + 1.0);\n}\n"
  );
  assert!(record.dependencies.is_empty());
}

#[test]
fn struct_types_of_functions_are_declared_once() {
  let compiler = Compiler::default();
  let l = Param::new("l", light());
  let def = FunctionDef::new(
    "user::power",
    "power2",
    vec![l.clone()],
    l.expr().field("power") * 2.,
  );
  let record = compiler.define_function(&def).unwrap();

  assert_eq!(
    record.code,
    "float power2(Light l) {\n  return (l.power * 2.0);\n}\n"
  );
  assert_eq!(record.struct_types.len(), 1);

  let q = Query::new().from(
    "u",
    query::uniforms_of(structure("Params", vec![("sun", light())])),
  );
  let sun = q.var("u").field("sun");
  let shader = q.select(query::project(
    structure("Output", vec![("value", f32::ty())]),
    vec![def.call(vec![sun])],
  ));

  let glsl = compiler.compile_to_string(&shader).unwrap();
  assert_eq!(glsl.matches("struct Light {").count(), 1);
  assert!(glsl.find("struct Light").unwrap() < glsl.find("float power2").unwrap());
}

#[test]
fn struct_types_of_functions_only() {
  let compiler = Compiler::default();
  let l = Param::new("l", light());
  let def = FunctionDef::new(
    "user::power",
    "power2",
    vec![l.clone()],
    l.expr().field("power"),
  );
  compiler.define_function(&def).unwrap();

  let shader = scalar_shader(|t| {
    def.call(vec![query::project(
      light(),
      vec![stdlib::vec3(1., 1., 1.), t],
    )])
  });
  let expected = "#version 330 core

in float t;
struct Light {
  vec3 color;
  float power;
};
out float value;

float power2(Light l) {
  return l.power;
}

void main() {
  value = power2(Light(vec3(1.0, 1.0, 1.0), t));
}
";

  assert_eq!(compiler.compile_to_string(&shader).unwrap(), expected);
}

#[test]
fn recursive_function() {
  let compiler = Compiler::default();
  let x = Param::new("x", f32::ty());
  let def = FunctionDef::new(
    "user::r",
    "r",
    vec![x.clone()],
    Expr::call("user::r", f32::ty(), vec![x.expr()]),
  );

  assert!(matches!(
    compiler.define_function(&def),
    Err(CompileError::CyclicFunctionDependency(_))
  ));
  assert!(compiler.functions().is_empty());
}

#[test]
fn cyclic_records() {
  let compiler = Compiler::default();
  compiler.functions().insert(FunctionRecord::new(
    "user::a",
    "a",
    "float a() {\n  return b();\n}\n",
    vec![DeclId::new("user::b")],
  ));
  compiler.functions().insert(FunctionRecord::new(
    "user::b",
    "b",
    "float b() {\n  return a();\n}\n",
    vec![DeclId::new("user::a")],
  ));

  let shader = scalar_shader(|t| t + Expr::call("user::a", f32::ty(), Vec::new()));

  match compiler.compile(&shader) {
    Err(CompileError::CyclicFunctionDependency(cycle)) => {
      assert_eq!(cycle, "user::a -> user::b -> user::a")
    }
    r => panic!("unexpected {:?}", r),
  }
}

#[test]
fn undefined_function() {
  let shader = scalar_shader(|t| Expr::call("user::nope", f32::ty(), vec![t]));

  assert!(matches!(
    Compiler::default().compile(&shader),
    Err(CompileError::UnsupportedDeclaration { .. })
  ));
}

#[test]
fn missing_declaration() {
  let q = Query::new().bind("x", 1.);
  let x = q.var("x");
  let shader = q.select(query::project(
    structure("Output", vec![("value", f32::ty())]),
    vec![x],
  ));

  assert!(matches!(
    Compiler::default().compile(&shader),
    Err(CompileError::MissingDeclarationClause)
  ));
}

#[test]
fn missing_select() {
  let inputs = structure("Inputs", vec![("t", f32::ty())]);
  let v = Param::new("v", inputs.clone());
  let from = Expr::call(decl::FROM, inputs.clone(), vec![v.expr(), query::inputs_of(inputs)]);
  let shader = from.method(
    decl::LET,
    f32::ty(),
    vec![Expr::param("x", f32::ty()), Expr::from(1.)],
  );

  assert!(matches!(
    Compiler::default().compile(&shader),
    Err(CompileError::MissingReturnClause)
  ));
}

#[test]
fn declaration_after_let() {
  let inputs = structure("Inputs", vec![("t", f32::ty())]);
  let q = Query::new()
    .from("v", query::inputs_of(inputs.clone()))
    .bind("x", 1.)
    .from("w", query::inputs_of(inputs));
  let shader = q.select(query::project(
    structure("Output", vec![("value", f32::ty())]),
    vec![Expr::from(1.)],
  ));

  assert!(matches!(
    Compiler::default().compile(&shader),
    Err(CompileError::MalformedClauseSequence(_))
  ));
}

#[test]
fn clause_after_select() {
  let shader = scalar_shader(|t| t).method(
    decl::LET,
    f32::ty(),
    vec![Expr::param("x", f32::ty()), Expr::from(1.)],
  );

  assert!(matches!(
    Compiler::default().compile(&shader),
    Err(CompileError::MalformedClauseSequence(_))
  ));
}

#[test]
fn from_must_declare() {
  let q = Query::new().from("x", Expr::from(1.));
  let shader = q.select(query::project(
    structure("Output", vec![("value", f32::ty())]),
    vec![Expr::from(1.)],
  ));

  assert!(matches!(
    Compiler::default().compile(&shader),
    Err(CompileError::MalformedClauseSequence(_))
  ));
}

#[test]
fn select_must_construct_outputs() {
  let q = Query::new().from(
    "v",
    query::inputs_of(structure("Inputs", vec![("t", f32::ty())])),
  );
  let t = q.var("v").field("t");
  let shader = q.select(t);

  assert!(matches!(
    Compiler::default().compile(&shader),
    Err(CompileError::UnsupportedExpression(_))
  ));
}

#[test]
fn deterministic() {
  let shader = || {
    let params = structure(
      "Params",
      vec![("lights", Type::array(light(), 3)), ("sun", light())],
    );
    let q = Query::new().from("u", query::uniforms_of(params));
    let u = q.var("u");
    let lights = Query::new().from("l", u.field("lights").each());
    let l = lights.var("l");
    let total = query::aggregate(lights.select(l.field("color")), stdlib::vec3(0., 0., 0.), |acc, c| {
      acc + c
    });

    q.select(query::project(
      structure("Output", vec![("color", <V3<f32>>::ty())]),
      vec![total],
    ))
  };

  let compiler = Compiler::default();
  let first = compiler.compile_to_string(&shader()).unwrap();

  assert_eq!(compiler.compile_to_string(&shader()).unwrap(), first);
  assert_eq!(Compiler::default().compile_to_string(&shader()).unwrap(), first);
}

#[test]
fn member_of_constructed_struct() {
  let shader = scalar_shader(|t| {
    query::project(light(), vec![stdlib::vec3(1., 1., 1.), t]).field("power")
  });
  let expected = "#version 330 core

in float t;
struct Light {
  vec3 color;
  float power;
};
out float value;

void main() {
  value = Light(vec3(1.0, 1.0, 1.0), t).power;
}
";

  assert_eq!(
    Compiler::default().compile_to_string(&shader).unwrap(),
    expected
  );
}

#[test]
fn member_of_function_result() {
  let compiler = Compiler::default();
  let x = Param::new("x", f32::ty());
  let mk = FunctionDef::new(
    "user::mk",
    "mk",
    vec![x.clone()],
    query::project(light(), vec![stdlib::vec3(1., 1., 1.), x.expr()]),
  );
  compiler.define_function(&mk).unwrap();

  let shader = scalar_shader(|t| mk.call(vec![t]).field("power"));
  let expected = "#version 330 core

in float t;
struct Light {
  vec3 color;
  float power;
};
out float value;

Light mk(float x) {
  return Light(vec3(1.0, 1.0, 1.0), x);
}

void main() {
  value = mk(t).power;
}
";

  assert_eq!(compiler.compile_to_string(&shader).unwrap(), expected);
}

#[test]
fn struct_inputs_next_to_struct_uniforms() {
  let q = Query::new()
    .from("v", query::inputs_of(light()))
    .from(
      "u",
      query::uniforms_of(structure("Params", vec![("sun", light())])),
    );
  let v = q.var("v");
  let u = q.var("u");
  let shader = q.select(query::project(
    structure("Outputs", vec![("value", f32::ty())]),
    vec![v.field("power") + u.field("sun").field("power")],
  ));
  let expected = "#version 330 core

in vec3 color;
in float power;
struct Light {
  vec3 color;
  float power;
};
uniform Light sun;
out float value;

void main() {
  value = (power + sun.power);
}
";

  assert_eq!(
    Compiler::default().compile_to_string(&shader).unwrap(),
    expected
  );
}

#[test]
fn fold_captures_outer_variables() {
  let params = structure("Params", vec![("weights", Type::array(f32::ty(), 2))]);
  let q = Query::new()
    .from("v", query::inputs_of(structure("Inputs", vec![("k", f32::ty())])))
    .from("u", query::uniforms_of(params));
  let k = q.var("v").field("k");
  let u = q.var("u");
  let q = q.bind("item", k * 3.);
  let item = q.var("item");

  let weights = Query::new().from("w", u.field("weights").each());
  let w = weights.var("w");
  let sum = query::aggregate(weights.select(w), 0., |acc, x| acc + x * item);
  let shader = q.select(query::project(
    structure("Outputs", vec![("value", f32::ty())]),
    vec![sum],
  ));
  let expected = "#version 330 core

in float k;
uniform float weights[2];
out float value;

void main() {
  float item = (k * 3.0);
  float acc_0 = 0.0;
  for (int idx_1 = 0; idx_1 < 2; idx_1++) {
    float w = weights[idx_1];
    acc_0 = (acc_0 + (w * item));
  }
  value = acc_0;
}
";

  assert_eq!(
    Compiler::default().compile_to_string(&shader).unwrap(),
    expected
  );
}

#[test]
fn nested_folds() {
  let params = structure(
    "Params",
    vec![
      ("lights", Type::array(light(), 2)),
      ("weights", Type::array(f32::ty(), 3)),
    ],
  );
  let q = Query::new().from("u", query::uniforms_of(params));
  let u = q.var("u");

  let lights = Query::new().from("l", u.field("lights").each());
  let l = lights.var("l");
  let weights = Query::new().from("w", u.field("weights").each());
  let w = weights.var("w");
  let weighted = weights.select(w);

  let total = query::aggregate(lights.select(l), 0., |acc, light| {
    acc
      + query::aggregate(weighted, 0., |sum, w| {
        sum + w * light.field("power")
      })
  });
  let shader = q.select(query::project(
    structure("Output", vec![("intensity", f32::ty())]),
    vec![total],
  ));
  let expected = "#version 330 core

struct Light {
  vec3 color;
  float power;
};
uniform Light lights[2];
uniform float weights[3];
out float intensity;

void main() {
  float acc_0 = 0.0;
  for (int idx_1 = 0; idx_1 < 2; idx_1++) {
    Light l = lights[idx_1];
    float acc_2 = 0.0;
    for (int idx_3 = 0; idx_3 < 3; idx_3++) {
      float w = weights[idx_3];
      acc_2 = (acc_2 + (w * l.power));
    }
    acc_0 = (acc_0 + acc_2);
  }
  intensity = acc_0;
}
";

  assert_eq!(
    Compiler::default().compile_to_string(&shader).unwrap(),
    expected
  );
}

#[test]
fn fold_in_function() {
  let compiler = Compiler::default();
  let ws = Param::new("ws", Type::array(f32::ty(), 3));
  let x = Param::new("x", f32::ty());

  let items = Query::new().from("w", ws.expr().each());
  let w = items.var("w");
  let q = Query::new().bind(
    "s",
    query::aggregate(items.select(w), 0., |acc, w| acc + w),
  );
  let s = q.var("s");
  let def = FunctionDef::new(
    "user::weighted",
    "weighted",
    vec![ws, x.clone()],
    q.select(s * x.expr()),
  );
  compiler.define_function(&def).unwrap();

  let q = Query::new().from(
    "u",
    query::uniforms_of(structure(
      "Params",
      vec![("weights", Type::array(f32::ty(), 3))],
    )),
  );
  let u = q.var("u");
  let shader = q.select(query::project(
    structure("Output", vec![("value", f32::ty())]),
    vec![def.call(vec![u.field("weights"), Expr::from(2.)])],
  ));
  let expected = "#version 330 core

uniform float weights[3];
out float value;

float weighted(float ws[3], float x) {
  float acc_0 = 0.0;
  for (int idx_1 = 0; idx_1 < 3; idx_1++) {
    float w = ws[idx_1];
    acc_0 = (acc_0 + w);
  }
  float s = acc_0;
  return (s * x);
}

void main() {
  value = weighted(weights, 2.0);
}
";

  assert_eq!(compiler.compile_to_string(&shader).unwrap(), expected);
}

#[test]
fn caches_shared_across_threads() {
  let functions = Arc::new(FunctionCache::new());
  let fields = Arc::new(FieldCache::new());
  let compiler = || {
    Compiler::with_caches(
      SyntaxRegistry::glsl(),
      Target::default(),
      functions.clone(),
      fields.clone(),
    )
  };

  let l = Param::new("l", light());
  let def = FunctionDef::new(
    "user::power",
    "power2",
    vec![l.clone()],
    l.expr().field("power") * 2.,
  );

  let q = Query::new().from(
    "u",
    query::uniforms_of(structure("Params", vec![("sun", light())])),
  );
  let sun = q.var("u").field("sun");
  let shader = q.select(query::project(
    structure("Output", vec![("value", f32::ty())]),
    vec![def.call(vec![sun])],
  ));

  let compile_all = || {
    thread::scope(|s| {
      let handles = (0..4)
        .map(|_| {
          s.spawn(|| {
            let compiler = compiler();
            compiler.define_function(&def).unwrap();
            compiler.compile_to_string(&shader).unwrap()
          })
        })
        .collect::<Vec<_>>();

      handles
        .into_iter()
        .map(|handle| handle.join().unwrap())
        .collect::<Vec<_>>()
    })
  };

  let cold = compile_all();
  assert!(cold.iter().all(|glsl| *glsl == cold[0]));
  assert_eq!(functions.len(), 1);
  assert_eq!(fields.len(), 1);

  let warm = compile_all();
  assert!(warm.iter().all(|glsl| *glsl == cold[0]));
  assert_eq!(functions.len(), 1);
  assert_eq!(fields.len(), 1);
  assert!(cold[0].contains("float power2(Light l) {"));
}

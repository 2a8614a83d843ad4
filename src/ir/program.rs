//! Whole programs: function graphs plus callable entities.

use crate::ir::entities::{Ent, Func};
use crate::ir::graph::FunctionData;
use crate::ir::props::FuncProps;
use cranelift_entity::packed_option::PackedOption;
use cranelift_entity::PrimaryMap;

/// The kind of one parameter of a signature.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParamKind {
    /// A plain value parameter.
    Value,
    /// An aggregate passed by value. Procedures taking these are never
    /// const or pure.
    Compound,
}

/// A procedure signature, reduced to what the analyses consume.
#[derive(Clone, Debug, Default)]
pub struct Signature {
    /// Parameter kinds, in order.
    pub params: Vec<ParamKind>,
    /// Number of results.
    pub n_results: usize,
}

impl Signature {
    /// A signature with `n_params` value parameters and `n_results`
    /// results.
    pub fn simple(n_params: usize, n_results: usize) -> Self {
        Self {
            params: vec![ParamKind::Value; n_params],
            n_results,
        }
    }

    /// Does any parameter have compound type?
    pub fn has_compound_params(&self) -> bool {
        self.params.iter().any(|&p| p == ParamKind::Compound)
    }
}

/// A callable entity.
pub struct EntityData {
    /// Name, for logging only.
    pub name: String,
    /// The defining graph, if the procedure is defined in this program.
    pub func: PackedOption<Func>,
    /// Property word. For external procedures this is authoritative; for
    /// defined ones it mirrors the graph's word once the solver ran.
    pub props: FuncProps,
    /// The signature.
    pub sig: Signature,
}

/// A whole program: every function graph and every callable entity.
pub struct Program {
    /// The function graphs.
    pub funcs: PrimaryMap<Func, FunctionData>,
    /// The callable entities.
    pub ents: PrimaryMap<Ent, EntityData>,
}

impl Program {
    /// Create an empty program.
    pub fn new() -> Self {
        Self {
            funcs: PrimaryMap::new(),
            ents: PrimaryMap::new(),
        }
    }

    /// Define a procedure: creates its graph and the entity naming it.
    pub fn define_func(&mut self, name: &str, sig: Signature) -> (Func, Ent) {
        let func = self.funcs.push(FunctionData::new(name));
        let ent = self.ents.push(EntityData {
            name: name.to_string(),
            func: func.into(),
            props: FuncProps::NONE,
            sig,
        });
        (func, ent)
    }

    /// Declare an external procedure with the given authoritative
    /// properties.
    pub fn declare_ent(&mut self, name: &str, sig: Signature, props: FuncProps) -> Ent {
        self.ents.push(EntityData {
            name: name.to_string(),
            func: PackedOption::default(),
            props,
            sig,
        })
    }

    /// The entity whose graph is `func`, if any.
    pub fn ent_of_func(&self, func: Func) -> Option<Ent> {
        self.ents
            .iter()
            .find(|(_, data)| data.func.expand() == Some(func))
            .map(|(ent, _)| ent)
    }

    /// The effective property word of an entity: the graph's word for
    /// defined procedures, the declared word for external ones.
    pub fn ent_props(&self, ent: Ent) -> FuncProps {
        match self.ents[ent].func.expand() {
            Some(func) => self.funcs[func].props,
            None => self.ents[ent].props,
        }
    }

    /// Merge `props` into a procedure's property word, on both the graph
    /// and its entity.
    pub fn add_func_props(&mut self, func: Func, props: FuncProps) {
        self.funcs[func].props = self.funcs[func].props | props;
        if let Some(ent) = self.ent_of_func(func) {
            self.ents[ent].props = self.ents[ent].props | props;
        }
    }

    /// The signature of a defined procedure.
    pub fn func_sig(&self, func: Func) -> &Signature {
        let ent = self
            .ent_of_func(func)
            .expect("defined function without entity");
        &self.ents[ent].sig
    }
}

impl Default for Program {
    fn default() -> Self {
        Self::new()
    }
}

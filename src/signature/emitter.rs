//! Renders signature trees - to a string and blob when fully closed, or to
//! runtime-executed instructions when resolution must be deferred.

use uguid::Guid;

use crate::{
    assembly::Instruction,
    metadata::{
        member::{MemberRefKind, MethodBody, MethodSig},
        module::Module,
        token::Token,
        typesystem::{PrimitiveKind, TypeSig},
    },
    signature::{
        iid,
        model::{CustomSignatureTarget, SignaturePart},
    },
    Error, Result,
};

/// Render a fully closed tree into its signature string.
///
/// # Errors
/// Returns [`Error::SignatureNotClosed`] if the tree contains an open
/// parameter or a custom signature routine - those have no static text.
pub fn render(part: &SignaturePart) -> Result<String> {
    let mut out = String::new();
    render_into(part, &mut out)?;
    Ok(out)
}

fn render_into(part: &SignaturePart, out: &mut String) -> Result<()> {
    match part {
        SignaturePart::Basic(kind) => out.push_str(kind.canonical_name()),
        SignaturePart::Composite {
            grouping,
            this_entity,
            children,
        } => {
            out.push_str(grouping);
            out.push('(');
            out.push_str(this_entity);
            for child in children {
                out.push(';');
                render_into(child, out)?;
            }
            out.push(')');
        }
        SignaturePart::Literal(guid) => out.push_str(&iid::braced(*guid)),
        // The opening parenthesis is never closed here; the runtime's own
        // grammar closes it implicitly and the hash input must match it
        // exactly.
        SignaturePart::NonGenericDelegate(guid) => {
            out.push_str("delegate(");
            out.push_str(&iid::braced(*guid));
        }
        SignaturePart::OpenParameter { method, index } => {
            return Err(Error::SignatureNotClosed(format!(
                "open generic parameter {}{}",
                if *method { "!!" } else { "!" },
                index
            )));
        }
        SignaturePart::CustomAlgorithm(target) => {
            return Err(Error::SignatureNotClosed(format!(
                "custom signature routine {}.{}::{}",
                target.namespace, target.name, target.method
            )));
        }
    }
    Ok(())
}

/// Evaluate a fully closed tree to its IID.
///
/// # Errors
/// Same failure mode as [`render`].
pub fn evaluate(part: &SignaturePart) -> Result<Guid> {
    Ok(iid::create_iid(&render(part)?))
}

/// One step of a runtime-assembled signature.
#[derive(Debug, Clone, PartialEq)]
pub enum SignatureStep {
    /// A constant text fragment.
    Text(String),
    /// The signature of the type substituted for the accessor's generic
    /// parameter at `slot`, computed by the runtime generator.
    ParameterSignature {
        /// Zero-based generic parameter slot of the synthesized accessor.
        slot: u32,
    },
    /// The output of a type's own signature routine.
    CustomCall(CustomSignatureTarget),
}

/// A signature lowered to runtime steps, plus the original open parameters
/// backing each accessor slot, in first-appearance order.
#[derive(Debug, Clone)]
pub struct RuntimeSignature {
    /// The assembly steps, adjacent text pre-coalesced.
    pub steps: Vec<SignatureStep>,
    /// For each accessor slot, the `(method, index)` of the original open
    /// parameter it stands in for.
    pub open_params: Vec<(bool, u32)>,
}

/// Lower a tree into runtime assembly steps.
///
/// Distinct open parameters are assigned accessor slots in first-appearance
/// order; a parameter appearing twice shares one slot.
#[must_use]
pub fn compile(part: &SignaturePart) -> RuntimeSignature {
    let mut raw_steps = Vec::new();
    let mut open_params = Vec::new();
    walk(part, &mut raw_steps, &mut open_params);

    // Coalesce adjacent constant text so the emitted body loads as few
    // string literals as possible.
    let mut steps: Vec<SignatureStep> = Vec::new();
    for step in raw_steps {
        match (steps.last_mut(), step) {
            (Some(SignatureStep::Text(acc)), SignatureStep::Text(next)) => acc.push_str(&next),
            (_, step) => steps.push(step),
        }
    }

    RuntimeSignature { steps, open_params }
}

fn walk(part: &SignaturePart, steps: &mut Vec<SignatureStep>, open_params: &mut Vec<(bool, u32)>) {
    match part {
        SignaturePart::Basic(kind) => {
            steps.push(SignatureStep::Text(kind.canonical_name().to_string()));
        }
        SignaturePart::Composite {
            grouping,
            this_entity,
            children,
        } => {
            steps.push(SignatureStep::Text(format!("{grouping}({this_entity}")));
            for child in children {
                steps.push(SignatureStep::Text(";".to_string()));
                walk(child, steps, open_params);
            }
            steps.push(SignatureStep::Text(")".to_string()));
        }
        SignaturePart::Literal(guid) => steps.push(SignatureStep::Text(iid::braced(*guid))),
        SignaturePart::NonGenericDelegate(guid) => {
            steps.push(SignatureStep::Text(format!("delegate({}", iid::braced(*guid))));
        }
        SignaturePart::OpenParameter { method, index } => {
            let key = (*method, *index);
            let slot = match open_params.iter().position(|p| *p == key) {
                Some(existing) => existing,
                None => {
                    open_params.push(key);
                    open_params.len() - 1
                }
            };
            steps.push(SignatureStep::ParameterSignature { slot: slot as u32 });
        }
        SignaturePart::CustomAlgorithm(target) => {
            steps.push(SignatureStep::CustomCall(target.clone()));
        }
    }
}

/// The member-reference tokens a runtime-assembled accessor body calls
/// into, all imported into the patched module.
#[derive(Debug, Clone)]
pub struct RuntimeEmissionTokens {
    /// `System.Type::GetTypeFromHandle`.
    pub get_type_from_handle: Token,
    /// The runtime generator's signature routine (`GetSignature`).
    pub get_signature: Token,
    /// `System.String::Concat(string, string)`.
    pub string_concat: Token,
    /// The runtime generator's hash routine taking an assembled signature.
    pub create_iid_from_signature: Token,
}

/// Emit the body of a runtime-assembled-signature accessor.
///
/// The body concatenates the constant fragments with the signatures of the
/// substituted parameters (or custom routine outputs) and delegates the
/// final hash to the runtime generator; the hash algorithm is never
/// re-implemented in emitted code.
///
/// # Errors
/// Returns [`Error::TypeError`] when a custom routine's declaring type
/// cannot be imported.
pub fn emit_runtime_body(
    module: &Module,
    tokens: &RuntimeEmissionTokens,
    compiled: &RuntimeSignature,
) -> Result<MethodBody> {
    let mut instructions = Vec::new();

    for (position, step) in compiled.steps.iter().enumerate() {
        match step {
            SignatureStep::Text(text) => {
                instructions.push(Instruction::ldstr(module.ensure_user_string(text)));
            }
            SignatureStep::ParameterSignature { slot } => {
                let param_spec = module.ensure_type_spec(TypeSig::GenericParam {
                    method: true,
                    index: *slot,
                });
                instructions.push(Instruction::ldtoken(param_spec));
                instructions.push(Instruction::call(tokens.get_type_from_handle));
                instructions.push(Instruction::call(tokens.get_signature));
            }
            SignatureStep::CustomCall(target) => {
                instructions.push(Instruction::call(import_custom_target(module, target)?));
            }
        }
        if position > 0 {
            instructions.push(Instruction::call(tokens.string_concat));
        }
    }

    instructions.push(Instruction::call(tokens.create_iid_from_signature));
    instructions.push(Instruction::ret());

    Ok(MethodBody {
        max_stack: 3,
        instructions,
    })
}

fn import_custom_target(module: &Module, target: &CustomSignatureTarget) -> Result<Token> {
    let parent = match &target.assembly {
        Some(assembly) => module.ensure_type_ref(assembly, &target.namespace, &target.name),
        None => {
            let fullname = if target.namespace.is_empty() {
                target.name.clone()
            } else {
                format!("{}.{}", target.namespace, target.name)
            };
            module
                .type_by_fullname(&fullname)
                .map(|def| def.token)
                .ok_or_else(|| {
                    Error::TypeError(format!("custom signature type {fullname} not found"))
                })?
        }
    };
    Ok(module.ensure_member_ref(
        parent,
        &target.method,
        MemberRefKind::Method(MethodSig::returning(TypeSig::Primitive(
            PrimitiveKind::String,
        ))),
    ))
}

//! The instruction-stream pattern matcher.

use std::sync::Arc;

use crate::{
    assembly::{Instruction, OpCode},
    metadata::{
        member::MethodRc, module::Module, resolver::AssemblyResolver, typesystem::TypeSig,
    },
};

/// The call sequence being matched, per state:
///
/// ```text
/// ldtoken <type>                   Start → Ldtoken
/// call GetTypeFromHandle           Ldtoken → GetTypeFromHandle
/// call GetHelperType   (optional)  GetTypeFromHandle → GetHelperTypeOptional
/// call GetIID | CreateIID          → match
/// ```
///
/// The pattern is a strict contiguous sequence: any deviation resets the
/// machine to `Start` and drops the captured context, so a partial prefix
/// can never cause a mis-patch. The companion-type call in the middle is
/// optional, which is why the machine tolerates two span lengths without
/// ambiguity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MatchState {
    Start,
    Ldtoken,
    GetTypeFromHandle,
    GetHelperTypeOptional,
}

/// A matched IID-computation call site.
#[derive(Debug, Clone)]
pub struct CallSiteMatch {
    /// The type whose IID the site computes.
    pub type_sig: TypeSig,
    /// Index of the `ldtoken` instruction.
    pub start: usize,
    /// Length of the span to replace: the `ldtoken` plus its 2 or 3
    /// trailing calls.
    pub len: usize,
}

/// The well-known routines whose call sites form the pattern.
pub struct MatcherTargets {
    /// `System.Type::GetTypeFromHandle`, resolved to its definition.
    pub get_type_from_handle: MethodRc,
    /// The companion-type accessor routine (`GetHelperType`).
    pub get_helper_type: MethodRc,
    /// The IID-get routine (`GetIID`).
    pub get_iid: MethodRc,
    /// The IID-create routine (`CreateIID`).
    pub create_iid: MethodRc,
}

/// Scans method bodies for the IID-computation call pattern.
///
/// Call targets are resolved to their definitions and compared by identity;
/// a call that cannot be resolved is simply a non-matching instruction.
pub struct PatternMatcher<'a> {
    module: Arc<Module>,
    resolver: &'a dyn AssemblyResolver,
    targets: MatcherTargets,
}

impl<'a> PatternMatcher<'a> {
    /// Create a matcher for one module.
    #[must_use]
    pub fn new(
        module: Arc<Module>,
        resolver: &'a dyn AssemblyResolver,
        targets: MatcherTargets,
    ) -> PatternMatcher<'a> {
        PatternMatcher {
            module,
            resolver,
            targets,
        }
    }

    /// Scan one instruction stream left to right, yielding matches in
    /// encounter order.
    #[must_use]
    pub fn scan(&self, instructions: &[Instruction]) -> Vec<CallSiteMatch> {
        let mut matches = Vec::new();
        let mut state = MatchState::Start;
        let mut captured: Option<TypeSig> = None;
        let mut start = 0usize;

        let mut i = 0usize;
        while i < instructions.len() {
            let instruction = &instructions[i];
            match state {
                MatchState::Start => {
                    if instruction.opcode == OpCode::Ldtoken {
                        let operand_sig = instruction
                            .token_operand()
                            .and_then(|token| self.module.type_sig_for_token(token));
                        if let Some(sig) = operand_sig {
                            // A bare generic parameter has no identity of
                            // its own to precompute.
                            if !matches!(sig, TypeSig::GenericParam { .. }) {
                                captured = Some(sig);
                                start = i;
                                state = MatchState::Ldtoken;
                            }
                        }
                    }
                    i += 1;
                }
                MatchState::Ldtoken => {
                    match self.resolved_call_target(instruction) {
                        Some(target)
                            if Arc::ptr_eq(&target, &self.targets.get_type_from_handle) =>
                        {
                            state = MatchState::GetTypeFromHandle;
                        }
                        _ => {
                            state = MatchState::Start;
                            captured = None;
                        }
                    }
                    i += 1;
                }
                MatchState::GetTypeFromHandle => {
                    match self.resolved_call_target(instruction) {
                        Some(target) if Arc::ptr_eq(&target, &self.targets.get_helper_type) => {
                            // Absorb the optional companion-type call,
                            // widening the span by one instruction.
                            state = MatchState::GetHelperTypeOptional;
                            i += 1;
                        }
                        _ => {
                            // Optional step absent: evaluate this same
                            // instruction as the final call.
                            state = MatchState::GetHelperTypeOptional;
                        }
                    }
                }
                MatchState::GetHelperTypeOptional => {
                    if let Some(target) = self.resolved_call_target(instruction) {
                        if Arc::ptr_eq(&target, &self.targets.get_iid)
                            || Arc::ptr_eq(&target, &self.targets.create_iid)
                        {
                            if let Some(type_sig) = captured.take() {
                                matches.push(CallSiteMatch {
                                    type_sig,
                                    start,
                                    len: i - start + 1,
                                });
                            }
                        }
                    }
                    state = MatchState::Start;
                    captured = None;
                    i += 1;
                }
            }
        }
        matches
    }

    fn resolved_call_target(&self, instruction: &Instruction) -> Option<MethodRc> {
        if instruction.opcode != OpCode::Call {
            return None;
        }
        self.module
            .resolve_method_token(instruction.token_operand()?, self.resolver)
    }
}

// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

/// Outcome of one step. `Next` carries the successor state, which owns
/// everything the previous state handed over.
pub enum Transition<S, R> {
    Next(S, R),
    Done(R),
}

pub trait StateMachine<Ctx, Resp>: Sized {
    type StepResult<'a>: Future<Output = Resp> + Send + 'a
    where
        Self: 'a,
        Resp: 'a,
        Ctx: 'a;

    /// Consumes the state; only one state is alive per machine.
    fn step<'a>(self, ctx: &'a mut Ctx) -> Self::StepResult<'a>;
}

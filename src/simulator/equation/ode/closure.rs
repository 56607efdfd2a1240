use crate::data::Excitation;
use crate::simulator::{DiffEq, M, T, V};
use diffsol::{
    ConstantOp, LinearOp, NonLinearOp, NonLinearOpJacobian, OdeEquations, OdeEquationsRef, Op,
};

pub struct LumpRhs<'a> {
    nstates: usize,
    nparams: usize,
    excitation: &'a Excitation,
    p: &'a V,
    func: DiffEq,
}

impl LumpRhs<'_> {
    #[inline(always)]
    fn inputs(&self, t: T) -> V {
        let mut u = V::zeros(self.nstates);
        self.excitation.evaluate(t, u.as_mut_slice());
        u
    }
}

impl Op for LumpRhs<'_> {
    type T = T;
    type V = V;
    type M = M;
    fn nstates(&self) -> usize {
        self.nstates
    }
    fn nout(&self) -> usize {
        self.nstates
    }
    fn nparams(&self) -> usize {
        self.nparams
    }
}

pub struct LumpMass {
    nstates: usize,
    nout: usize,
    nparams: usize,
}

impl Op for LumpMass {
    type T = T;
    type V = V;
    type M = M;
    fn nstates(&self) -> usize {
        self.nstates
    }
    fn nout(&self) -> usize {
        self.nout
    }
    fn nparams(&self) -> usize {
        self.nparams
    }
}

pub struct LumpInit {
    nstates: usize,
    nout: usize,
    nparams: usize,
    init: V,
}

impl Op for LumpInit {
    type T = T;
    type V = V;
    type M = M;
    fn nstates(&self) -> usize {
        self.nstates
    }
    fn nout(&self) -> usize {
        self.nout
    }
    fn nparams(&self) -> usize {
        self.nparams
    }
}

pub struct LumpRoot {
    nstates: usize,
    nout: usize,
    nparams: usize,
}

impl Op for LumpRoot {
    type T = T;
    type V = V;
    type M = M;
    fn nstates(&self) -> usize {
        self.nstates
    }
    fn nout(&self) -> usize {
        self.nout
    }
    fn nparams(&self) -> usize {
        self.nparams
    }
}

pub struct LumpOut {
    nstates: usize,
    nout: usize,
    nparams: usize,
}

impl Op for LumpOut {
    type T = T;
    type V = V;
    type M = M;
    fn nstates(&self) -> usize {
        self.nstates
    }
    fn nout(&self) -> usize {
        self.nout
    }
    fn nparams(&self) -> usize {
        self.nparams
    }
}

impl NonLinearOp for LumpRhs<'_> {
    fn call_inplace(&self, x: &Self::V, t: Self::T, y: &mut Self::V) {
        let u = self.inputs(t);
        y.fill(0.0);
        (self.func)(x, self.p, t, y, &u)
    }
}

impl NonLinearOpJacobian for LumpRhs<'_> {
    // Directional finite difference, the inputs cancel out
    fn jac_mul_inplace(&self, x: &Self::V, t: Self::T, v: &Self::V, y: &mut Self::V) {
        let vnorm = v.norm();
        if vnorm == 0.0 {
            y.fill(0.0);
            return;
        }
        let eps = T::EPSILON.sqrt() * (1.0 + x.norm()) / vnorm;
        let u = self.inputs(t);

        let mut f0 = V::zeros(self.nstates);
        (self.func)(x, self.p, t, &mut f0, &u);

        let xp = x + v * eps;
        y.fill(0.0);
        (self.func)(&xp, self.p, t, y, &u);
        *y -= &f0;
        *y /= eps;
    }
}

impl LinearOp for LumpMass {
    fn gemv_inplace(&self, _x: &Self::V, _t: Self::T, _beta: Self::T, _y: &mut Self::V) {}
}

impl ConstantOp for LumpInit {
    fn call_inplace(&self, _t: Self::T, y: &mut Self::V) {
        y.copy_from(&self.init);
    }
}

impl NonLinearOp for LumpRoot {
    fn call_inplace(&self, _x: &Self::V, _t: Self::T, _y: &mut Self::V) {}
}

impl NonLinearOp for LumpOut {
    fn call_inplace(&self, _x: &Self::V, _t: Self::T, _y: &mut Self::V) {}
}

/// A lumped model compiled into the equation set consumed by the diffsol solvers.
///
/// The problem owns its parameters, inputs and initial state so that the solver
/// can borrow it for the whole integration.
pub struct LumpProblem {
    func: DiffEq,
    nstates: usize,
    nparams: usize,
    init: V,
    p: V,
    excitation: Excitation,
}

impl LumpProblem {
    pub fn new(func: DiffEq, nstates: usize, p: V, excitation: Excitation, init: V) -> Self {
        let nparams = p.len();
        Self {
            func,
            nstates,
            nparams,
            init,
            p,
            excitation,
        }
    }
}

impl Op for LumpProblem {
    type T = T;
    type V = V;
    type M = M;
    fn nstates(&self) -> usize {
        self.nstates
    }
    fn nout(&self) -> usize {
        self.nstates
    }
    fn nparams(&self) -> usize {
        self.nparams
    }
}

impl<'b> OdeEquationsRef<'b> for LumpProblem {
    type Rhs = LumpRhs<'b>;
    type Mass = LumpMass;
    type Init = LumpInit;
    type Root = LumpRoot;
    type Out = LumpOut;
}

impl OdeEquations for LumpProblem {
    fn rhs(&self) -> LumpRhs<'_> {
        LumpRhs {
            nstates: self.nstates,
            nparams: self.nparams,
            excitation: &self.excitation,
            p: &self.p,
            func: self.func,
        }
    }

    fn mass(&self) -> Option<LumpMass> {
        None
    }

    fn init(&self) -> LumpInit {
        LumpInit {
            nstates: self.nstates(),
            nout: self.nout(),
            nparams: self.nparams(),
            init: self.init.clone(),
        }
    }

    fn get_params(&self, p: &mut V) {
        p.copy_from(&self.p);
    }

    fn root(&self) -> Option<LumpRoot> {
        None
    }

    fn out(&self) -> Option<LumpOut> {
        None
    }

    fn set_params(&mut self, p: &V) {
        self.p = p.clone();
    }
}

//! Iterative solvers for A x = b
//!
//! Every method starts from x = 0 and stops when the true relative residual
//! `||b - A x|| / ||b||` drops below the tolerance. Running out of
//! iterations or a breakdown of the recurrence is reported as
//! non-convergence; no partial solution is returned.

use log::debug;
use serde::{Deserialize, Serialize};

use super::preconditioner::PreconditionerOp;
use super::storage::StoredMatrix;
use crate::error::{FEAError, FEAResult};
use crate::math::{Mat, Vec as FEVec};

const BREAKDOWN: f64 = 1e-300;

/// Krylov and refinement methods
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IterativeMethod {
    /// Conjugate gradient, symmetric positive definite systems
    ConjugateGradient,
    ConjugateGradientSquared,
    BiConjugateGradient,
    BiConjugateGradientStabilized,
    QuasiMinimalResidual,
    /// Restarted generalized minimal residual
    Gmres,
    /// Preconditioned residual correction
    IterativeRefinement,
}

impl IterativeMethod {
    pub fn name(self) -> &'static str {
        match self {
            IterativeMethod::ConjugateGradient => "CG",
            IterativeMethod::ConjugateGradientSquared => "CGS",
            IterativeMethod::BiConjugateGradient => "BiCG",
            IterativeMethod::BiConjugateGradientStabilized => "BiCGSTAB",
            IterativeMethod::QuasiMinimalResidual => "QMR",
            IterativeMethod::Gmres => "GMRES",
            IterativeMethod::IterativeRefinement => "IterativeRefinement",
        }
    }
}

/// Why an iteration stopped without converging
struct Stalled {
    iterations: usize,
    residual: f64,
}

type Outcome = Result<(FEVec, usize), Stalled>;

/// Matrix, preconditioner and stopping criteria of one solve
pub(crate) struct Krylov<'a> {
    pub a: &'a StoredMatrix,
    pub m: &'a PreconditionerOp,
    pub tolerance: f64,
    pub max_iterations: usize,
    pub restart: usize,
}

impl Krylov<'_> {
    /// Solve and return the solution with its iteration count and relative residual
    pub fn solve(&self, method: IterativeMethod, b: &FEVec) -> FEAResult<(FEVec, usize, f64)> {
        let b_norm = b.norm();
        if b_norm == 0.0 {
            return Ok((FEVec::zeros(b.len()), 0, 0.0));
        }

        // The recurrences track an updated residual that can drift from
        // b - A x. When a method reports convergence the true residual is
        // checked, and the method restarts on it with the iterations left.
        let mut x = FEVec::zeros(b.len());
        let mut r = b.clone();
        let mut used = 0;
        loop {
            let pass = Krylov {
                a: self.a,
                m: self.m,
                tolerance: self.tolerance,
                max_iterations: self.max_iterations - used,
                restart: self.restart,
            };
            let (dx, iterations) = pass.run(method, &r, b_norm).map_err(|stalled| {
                FEAError::SolverNonConvergence {
                    solver: method.name().to_string(),
                    iterations: used + stalled.iterations,
                    residual: stalled.residual,
                }
            })?;
            used += iterations.max(1);
            x += dx;
            r = b - self.a.matvec(&x);
            let residual = r.norm() / b_norm;

            if residual <= self.tolerance {
                debug!(
                    "{} converged in {} iterations (relative residual {:.3e})",
                    method.name(),
                    used,
                    residual
                );
                return Ok((x, used, residual));
            }
            if used >= self.max_iterations || !residual.is_finite() {
                return Err(FEAError::SolverNonConvergence {
                    solver: method.name().to_string(),
                    iterations: used,
                    residual,
                });
            }
            debug!(
                "{}: true residual {:.3e} above tolerance after {} iterations, restarting",
                method.name(),
                residual,
                used
            );
        }
    }

    /// One run of `method` from zero, converging against `b_norm`
    fn run(&self, method: IterativeMethod, b: &FEVec, b_norm: f64) -> Outcome {
        match method {
            IterativeMethod::ConjugateGradient => self.cg(b, b_norm),
            IterativeMethod::ConjugateGradientSquared => self.cgs(b, b_norm),
            IterativeMethod::BiConjugateGradient => self.bicg(b, b_norm),
            IterativeMethod::BiConjugateGradientStabilized => self.bicgstab(b, b_norm),
            IterativeMethod::QuasiMinimalResidual => self.qmr(b, b_norm),
            IterativeMethod::Gmres => self.gmres(b, b_norm),
            IterativeMethod::IterativeRefinement => self.refinement(b, b_norm),
        }
    }

    #[inline]
    fn converged(&self, r_norm: f64, b_norm: f64) -> bool {
        r_norm <= self.tolerance * b_norm
    }

    fn stalled(&self, iterations: usize, r: &FEVec, b_norm: f64) -> Stalled {
        Stalled {
            iterations,
            residual: r.norm() / b_norm,
        }
    }

    fn cg(&self, b: &FEVec, b_norm: f64) -> Outcome {
        let mut x = FEVec::zeros(b.len());
        let mut r = b.clone();
        let mut z = self.m.apply(&r);
        let mut p = z.clone();
        let mut rz = r.dot(&z);

        for iter in 1..=self.max_iterations {
            let ap = self.a.matvec(&p);
            let pap = p.dot(&ap);
            if pap.abs() < BREAKDOWN {
                return Err(self.stalled(iter, &r, b_norm));
            }
            let alpha = rz / pap;
            x.axpy(alpha, &p, 1.0);
            r.axpy(-alpha, &ap, 1.0);

            if self.converged(r.norm(), b_norm) {
                return Ok((x, iter));
            }

            z = self.m.apply(&r);
            let rz_new = r.dot(&z);
            let beta = rz_new / rz;
            rz = rz_new;
            p = &z + beta * &p;
        }
        Err(self.stalled(self.max_iterations, &r, b_norm))
    }

    fn cgs(&self, b: &FEVec, b_norm: f64) -> Outcome {
        let n = b.len();
        let mut x = FEVec::zeros(n);
        let mut r = b.clone();
        let r_tilde = r.clone();
        let mut p = FEVec::zeros(n);
        let mut q = FEVec::zeros(n);
        let mut rho_prev = 1.0;

        for iter in 1..=self.max_iterations {
            let rho = r_tilde.dot(&r);
            if rho.abs() < BREAKDOWN {
                return Err(self.stalled(iter, &r, b_norm));
            }
            let u;
            if iter == 1 {
                u = r.clone();
                p = u.clone();
            } else {
                let beta = rho / rho_prev;
                u = &r + beta * &q;
                p = &u + beta * (&q + beta * &p);
            }
            let p_hat = self.m.apply(&p);
            let v_hat = self.a.matvec(&p_hat);
            let sigma = r_tilde.dot(&v_hat);
            if sigma.abs() < BREAKDOWN {
                return Err(self.stalled(iter, &r, b_norm));
            }
            let alpha = rho / sigma;
            q = &u - alpha * &v_hat;
            let u_hat = self.m.apply(&(&u + &q));
            x.axpy(alpha, &u_hat, 1.0);
            let q_hat = self.a.matvec(&u_hat);
            r.axpy(-alpha, &q_hat, 1.0);

            if self.converged(r.norm(), b_norm) {
                return Ok((x, iter));
            }
            rho_prev = rho;
        }
        Err(self.stalled(self.max_iterations, &r, b_norm))
    }

    fn bicg(&self, b: &FEVec, b_norm: f64) -> Outcome {
        let n = b.len();
        let mut x = FEVec::zeros(n);
        let mut r = b.clone();
        let mut r_tilde = r.clone();
        let mut p = FEVec::zeros(n);
        let mut p_tilde = FEVec::zeros(n);
        let mut rho_prev = 1.0;

        for iter in 1..=self.max_iterations {
            let z = self.m.apply(&r);
            let z_tilde = self.m.apply_transpose(&r_tilde);
            let rho = z.dot(&r_tilde);
            if rho.abs() < BREAKDOWN {
                return Err(self.stalled(iter, &r, b_norm));
            }
            if iter == 1 {
                p = z;
                p_tilde = z_tilde;
            } else {
                let beta = rho / rho_prev;
                p = z + beta * &p;
                p_tilde = z_tilde + beta * &p_tilde;
            }
            let q = self.a.matvec(&p);
            let q_tilde = self.a.transpose_matvec(&p_tilde);
            let sigma = p_tilde.dot(&q);
            if sigma.abs() < BREAKDOWN {
                return Err(self.stalled(iter, &r, b_norm));
            }
            let alpha = rho / sigma;
            x.axpy(alpha, &p, 1.0);
            r.axpy(-alpha, &q, 1.0);
            r_tilde.axpy(-alpha, &q_tilde, 1.0);

            if self.converged(r.norm(), b_norm) {
                return Ok((x, iter));
            }
            rho_prev = rho;
        }
        Err(self.stalled(self.max_iterations, &r, b_norm))
    }

    fn bicgstab(&self, b: &FEVec, b_norm: f64) -> Outcome {
        let n = b.len();
        let mut x = FEVec::zeros(n);
        let mut r = b.clone();
        let r_tilde = r.clone();
        let mut p = FEVec::zeros(n);
        let mut v = FEVec::zeros(n);
        let (mut rho_prev, mut alpha, mut omega) = (1.0, 1.0, 1.0);

        for iter in 1..=self.max_iterations {
            let rho = r_tilde.dot(&r);
            if rho.abs() < BREAKDOWN {
                return Err(self.stalled(iter, &r, b_norm));
            }
            if iter == 1 {
                p = r.clone();
            } else {
                let beta = (rho / rho_prev) * (alpha / omega);
                p = &r + beta * (&p - omega * &v);
            }
            let p_hat = self.m.apply(&p);
            v = self.a.matvec(&p_hat);
            let rv = r_tilde.dot(&v);
            if rv.abs() < BREAKDOWN {
                return Err(self.stalled(iter, &r, b_norm));
            }
            alpha = rho / rv;
            let s = &r - alpha * &v;
            if self.converged(s.norm(), b_norm) {
                x.axpy(alpha, &p_hat, 1.0);
                return Ok((x, iter));
            }

            let s_hat = self.m.apply(&s);
            let t = self.a.matvec(&s_hat);
            let tt = t.dot(&t);
            if tt < BREAKDOWN {
                return Err(self.stalled(iter, &s, b_norm));
            }
            omega = t.dot(&s) / tt;
            x.axpy(alpha, &p_hat, 1.0);
            x.axpy(omega, &s_hat, 1.0);
            r = &s - omega * &t;

            if self.converged(r.norm(), b_norm) {
                return Ok((x, iter));
            }
            if omega.abs() < BREAKDOWN {
                return Err(self.stalled(iter, &r, b_norm));
            }
            rho_prev = rho;
        }
        Err(self.stalled(self.max_iterations, &r, b_norm))
    }

    /// QMR without look-ahead, preconditioned from the left
    fn qmr(&self, b: &FEVec, b_norm: f64) -> Outcome {
        let n = b.len();
        let mut x = FEVec::zeros(n);
        let mut r = b.clone();

        let mut v_tilde = r.clone();
        let mut y = self.m.apply(&v_tilde);
        let mut rho = y.norm();
        let mut w_tilde = r.clone();
        let mut z = w_tilde.clone();
        let mut xi = z.norm();

        let (mut gamma, mut eta, mut theta, mut epsilon) = (1.0_f64, -1.0_f64, 0.0_f64, 1.0_f64);
        let mut p = FEVec::zeros(n);
        let mut q = FEVec::zeros(n);
        let mut d = FEVec::zeros(n);
        let mut s = FEVec::zeros(n);

        for iter in 1..=self.max_iterations {
            if rho.abs() < BREAKDOWN || xi.abs() < BREAKDOWN {
                return Err(self.stalled(iter, &r, b_norm));
            }
            let v = &v_tilde / rho;
            y /= rho;
            let w = &w_tilde / xi;
            z /= xi;

            let delta = z.dot(&y);
            if delta.abs() < BREAKDOWN {
                return Err(self.stalled(iter, &r, b_norm));
            }
            let z_tilde = self.m.apply_transpose(&z);
            if iter == 1 {
                p = y.clone();
                q = z_tilde;
            } else {
                p = &y - (xi * delta / epsilon) * &p;
                q = z_tilde - (rho * delta / epsilon) * &q;
            }

            let p_tilde = self.a.matvec(&p);
            epsilon = q.dot(&p_tilde);
            if epsilon.abs() < BREAKDOWN {
                return Err(self.stalled(iter, &r, b_norm));
            }
            let beta = epsilon / delta;
            if beta.abs() < BREAKDOWN {
                return Err(self.stalled(iter, &r, b_norm));
            }

            v_tilde = &p_tilde - beta * &v;
            y = self.m.apply(&v_tilde);
            let rho_prev = rho;
            rho = y.norm();
            w_tilde = self.a.transpose_matvec(&q) - beta * &w;
            z = w_tilde.clone();
            xi = z.norm();

            let theta_prev = theta;
            theta = rho / (gamma * beta.abs());
            let gamma_prev = gamma;
            gamma = 1.0 / (1.0 + theta * theta).sqrt();
            if gamma.abs() < BREAKDOWN {
                return Err(self.stalled(iter, &r, b_norm));
            }
            eta = -eta * rho_prev * gamma * gamma / (beta * gamma_prev * gamma_prev);

            let c = (theta_prev * gamma).powi(2);
            if iter == 1 {
                d = eta * &p;
                s = eta * &p_tilde;
            } else {
                d = eta * &p + c * &d;
                s = eta * &p_tilde + c * &s;
            }
            x += &d;
            r -= &s;

            if self.converged(r.norm(), b_norm) {
                return Ok((x, iter));
            }
        }
        Err(self.stalled(self.max_iterations, &r, b_norm))
    }

    /// Restarted GMRES, preconditioned from the right
    fn gmres(&self, b: &FEVec, b_norm: f64) -> Outcome {
        let n = b.len();
        let m = self.restart.max(1).min(n.max(1));
        let mut x = FEVec::zeros(n);
        let mut total = 0;

        loop {
            let r = b - self.a.matvec(&x);
            let beta = r.norm();
            if self.converged(beta, b_norm) {
                return Ok((x, total));
            }
            if total >= self.max_iterations {
                return Err(Stalled {
                    iterations: total,
                    residual: beta / b_norm,
                });
            }

            let mut basis: Vec<FEVec> = Vec::with_capacity(m + 1);
            basis.push(r / beta);
            let mut h = Mat::zeros(m + 1, m);
            let mut cs = vec![0.0; m];
            let mut sn = vec![0.0; m];
            let mut g = vec![0.0; m + 1];
            g[0] = beta;
            let mut k = 0;

            for j in 0..m {
                total += 1;
                k = j + 1;
                let mut w = self.a.matvec(&self.m.apply(&basis[j]));
                for (i, vi) in basis.iter().enumerate() {
                    h[(i, j)] = w.dot(vi);
                    w.axpy(-h[(i, j)], vi, 1.0);
                }
                let h_next = w.norm();
                h[(j + 1, j)] = h_next;

                for i in 0..j {
                    let tmp = cs[i] * h[(i, j)] + sn[i] * h[(i + 1, j)];
                    h[(i + 1, j)] = -sn[i] * h[(i, j)] + cs[i] * h[(i + 1, j)];
                    h[(i, j)] = tmp;
                }
                let denom = h[(j, j)].hypot(h[(j + 1, j)]);
                if denom < BREAKDOWN {
                    return Err(Stalled {
                        iterations: total,
                        residual: g[j].abs() / b_norm,
                    });
                }
                cs[j] = h[(j, j)] / denom;
                sn[j] = h[(j + 1, j)] / denom;
                h[(j, j)] = denom;
                h[(j + 1, j)] = 0.0;
                g[j + 1] = -sn[j] * g[j];
                g[j] *= cs[j];

                if self.converged(g[j + 1].abs(), b_norm)
                    || total >= self.max_iterations
                    || h_next < BREAKDOWN
                {
                    break;
                }
                basis.push(w / h_next);
            }

            // back substitution on the k x k triangle
            let mut yk = vec![0.0; k];
            for i in (0..k).rev() {
                let s: f64 = ((i + 1)..k).map(|l| h[(i, l)] * yk[l]).sum();
                yk[i] = (g[i] - s) / h[(i, i)];
            }
            let mut update = FEVec::zeros(n);
            for (i, yi) in yk.iter().enumerate() {
                update.axpy(*yi, &basis[i], 1.0);
            }
            x += self.m.apply(&update);
        }
    }

    /// x_{k+1} = x_k + M^-1 (b - A x_k)
    fn refinement(&self, b: &FEVec, b_norm: f64) -> Outcome {
        let mut x = FEVec::zeros(b.len());
        let mut r = b.clone();
        for iter in 1..=self.max_iterations {
            let d = self.m.apply(&r);
            x += d;
            r = b - self.a.matvec(&x);
            let r_norm = r.norm();
            if !r_norm.is_finite() {
                return Err(self.stalled(iter, &r, b_norm));
            }
            if self.converged(r_norm, b_norm) {
                return Ok((x, iter));
            }
        }
        Err(self.stalled(self.max_iterations, &r, b_norm))
    }
}

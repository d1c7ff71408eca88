//! Triangulation factor: reprojection error of one landmark in a fixed camera.
//!
//! The camera pose and calibration are constants of the factor; only the 3D point
//! is a variable. The residual is
//!
//! ```text
//! e(p) = project(p) - z
//! ```
//!
//! and linearization produces `A δ ≈ b` with `A = ∂project/∂p` and `b = -e(p)`, whitened
//! by the noise model when one is attached.
//!
//! # Cheirality
//!
//! Early iterations often move a landmark behind the camera. The factor does not fail
//! in that case unless asked to: the Jacobian is zeroed and a constant penalty residual
//! of `2·fx` per component is returned. `verbose_cheirality` logs the event and
//! `throw_cheirality` turns it into [`TriangulationError::Cheirality`].
//!
//! The penalty is not derivative-consistent: it comes with a zero Jacobian, so it
//! raises the cost without offering a descent direction.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use nalgebra::{DMatrix, DVector, Matrix2x3, Vector2, Vector3};
use tracing::{trace, warn};

use crate::camera::{Calibration, PinholeCamera, Projection};
use crate::core::factor::{ActivityPredicate, NonlinearFactor};
use crate::core::key::Key;
use crate::core::linear::{JacobianFactor, VerticalBlockMatrix};
use crate::core::noise_model::NoiseModel;
use crate::core::values::ValueLookup;
use crate::error::{TriangulationError, TriangulationResult};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Dimension of the pixel measurement
pub const MEASUREMENT_DIM: usize = 2;

/// Dimension of the landmark variable
pub const POINT_DIM: usize = 3;

/// The cheirality penalty is this multiple of the focal length.
pub const CHEIRALITY_PENALTY_SCALE: f64 = 2.0;

/// Scratch buffers reused across linearizations of one factor.
///
/// Allocated on first use with a fixed 2×3 Jacobian, 2-vector rhs and 2×4
/// augmented matrix; later calls overwrite the values in place. A workspace must
/// not be shared by concurrent linearizations.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LinearizationWorkspace {
    a: DMatrix<f64>,
    b: DVector<f64>,
    ab: Option<VerticalBlockMatrix>,
}

impl LinearizationWorkspace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_allocated(&self) -> bool {
        self.ab.is_some()
    }

    /// Whitened Jacobian from the last linearization (empty before the first).
    pub fn jacobian(&self) -> &DMatrix<f64> {
        &self.a
    }

    /// Whitened rhs from the last linearization (empty before the first).
    pub fn rhs(&self) -> &DVector<f64> {
        &self.b
    }

    pub fn augmented(&self) -> Option<&VerticalBlockMatrix> {
        self.ab.as_ref()
    }

    fn buffers(
        &mut self,
    ) -> (
        &mut DMatrix<f64>,
        &mut DVector<f64>,
        &mut VerticalBlockMatrix,
    ) {
        if self.ab.is_none() {
            trace!("allocating triangulation linearization workspace");
            self.a = DMatrix::zeros(MEASUREMENT_DIM, POINT_DIM);
            self.b = DVector::zeros(MEASUREMENT_DIM);
        }
        let ab = self
            .ab
            .get_or_insert_with(|| VerticalBlockMatrix::new(&[POINT_DIM], MEASUREMENT_DIM, true));
        (&mut self.a, &mut self.b, ab)
    }
}

/// Unary factor on a 3D landmark observed by a known camera.
///
/// # Example
///
/// ```
/// use triangulation_factor::camera::{PinholeCalibration, PinholeCamera};
/// use triangulation_factor::core::{Symbol, Values, NonlinearFactor};
/// use triangulation_factor::geometry::Pose3;
/// use triangulation_factor::TriangulationFactor;
/// use nalgebra::{Vector2, Vector3};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let camera = PinholeCamera::new(Pose3::identity(), PinholeCalibration::default());
/// let landmark = Symbol::new('l', 1).key();
/// let mut factor = TriangulationFactor::new(camera, Vector2::zeros(), None, landmark)?;
///
/// let mut values = Values::new();
/// values.insert(landmark, Vector3::new(1.0, 1.0, 5.0))?;
///
/// let linear = factor.linearize(&values)?.ok_or("factor is active")?;
/// assert!((linear.rhs()[0] + 0.2).abs() < 1e-12);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(try_from = "TriangulationFactorRepr<C>")
)]
pub struct TriangulationFactor<C>
where
    C: Calibration,
{
    /// Camera in which the landmark was seen
    camera: PinholeCamera<C>,
    /// 2D measurement in pixels
    measured: Vector2<f64>,
    noise_model: Option<NoiseModel>,
    keys: [Key; 1],
    /// Return `Err(Cheirality)` instead of the penalty residual
    throw_cheirality: bool,
    /// Log cheirality events
    verbose_cheirality: bool,
    #[cfg_attr(feature = "serde", serde(skip))]
    activity: Option<ActivityPredicate>,
    #[cfg_attr(feature = "serde", serde(skip))]
    workspace: LinearizationWorkspace,
}

/// Unchecked wire form of [`TriangulationFactor`]; converted through `with_flags`.
#[cfg(feature = "serde")]
#[derive(Deserialize)]
struct TriangulationFactorRepr<C>
where
    C: Calibration,
{
    camera: PinholeCamera<C>,
    measured: Vector2<f64>,
    noise_model: Option<NoiseModel>,
    keys: [Key; 1],
    throw_cheirality: bool,
    verbose_cheirality: bool,
}

#[cfg(feature = "serde")]
impl<C> TryFrom<TriangulationFactorRepr<C>> for TriangulationFactor<C>
where
    C: Calibration,
{
    type Error = TriangulationError;

    fn try_from(repr: TriangulationFactorRepr<C>) -> TriangulationResult<Self> {
        let [key] = repr.keys;
        Self::with_flags(
            repr.camera,
            repr.measured,
            repr.noise_model,
            key,
            repr.throw_cheirality,
            repr.verbose_cheirality,
        )
    }
}

impl<C> TriangulationFactor<C>
where
    C: Calibration,
{
    /// Create a factor with both cheirality flags off.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if `noise_model` is given and is not 2-dimensional.
    pub fn new(
        camera: PinholeCamera<C>,
        measured: Vector2<f64>,
        noise_model: Option<NoiseModel>,
        key: impl Into<Key>,
    ) -> TriangulationResult<Self> {
        Self::with_flags(camera, measured, noise_model, key, false, false)
    }

    /// Create a factor with explicit cheirality handling.
    ///
    /// # Arguments
    ///
    /// * `camera` - Camera in which the landmark is seen
    /// * `measured` - Pixel measurement
    /// * `noise_model` - Optional 2-dimensional noise model
    /// * `key` - Key of the landmark
    /// * `throw_cheirality` - Return an error when the landmark is behind the camera
    /// * `verbose_cheirality` - Log a warning when the landmark is behind the camera
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if `noise_model` is given and is not 2-dimensional.
    pub fn with_flags(
        camera: PinholeCamera<C>,
        measured: Vector2<f64>,
        noise_model: Option<NoiseModel>,
        key: impl Into<Key>,
        throw_cheirality: bool,
        verbose_cheirality: bool,
    ) -> TriangulationResult<Self> {
        if let Some(model) = &noise_model {
            if model.dim() != MEASUREMENT_DIM {
                return Err(TriangulationError::InvalidArgument(format!(
                    "TriangulationFactor must be created with a {MEASUREMENT_DIM}-dimensional noise model, got dimension {}",
                    model.dim()
                )));
            }
        }
        Ok(Self {
            camera,
            measured,
            noise_model,
            keys: [key.into()],
            throw_cheirality,
            verbose_cheirality,
            activity: None,
            workspace: LinearizationWorkspace::new(),
        })
    }

    /// Attach an activity predicate; inactive factors linearize to `None`.
    pub fn with_activity<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&dyn ValueLookup) -> bool + Send + Sync + 'static,
    {
        self.activity = Some(Arc::new(predicate));
        self
    }

    pub fn camera(&self) -> &PinholeCamera<C> {
        &self.camera
    }

    pub fn measured(&self) -> &Vector2<f64> {
        &self.measured
    }

    pub fn noise_model(&self) -> Option<&NoiseModel> {
        self.noise_model.as_ref()
    }

    pub fn key(&self) -> Key {
        self.keys[0]
    }

    pub fn throw_cheirality(&self) -> bool {
        self.throw_cheirality
    }

    pub fn verbose_cheirality(&self) -> bool {
        self.verbose_cheirality
    }

    /// This instance's scratch buffers.
    pub fn workspace(&self) -> &LinearizationWorkspace {
        &self.workspace
    }

    /// Penalty residual used when the landmark is behind the camera.
    pub fn cheirality_penalty(&self) -> Vector2<f64> {
        Vector2::repeat(CHEIRALITY_PENALTY_SCALE * self.camera.calibration().fx())
    }

    /// Apply the cheirality policy: log if verbose, fail if throwing, else penalty.
    fn handle_cheirality(&self, depth: f64) -> TriangulationResult<Vector2<f64>> {
        if self.verbose_cheirality {
            warn!(
                "Cheirality exception: Landmark {} moved behind camera (depth {:.6})",
                self.key(),
                depth
            );
        }
        if self.throw_cheirality {
            return Err(TriangulationError::Cheirality {
                key: self.key(),
                depth,
            });
        }
        Ok(self.cheirality_penalty())
    }

    /// Evaluate `project(point) - measured` and optionally ∂project/∂point.
    ///
    /// # Arguments
    ///
    /// * `point` - Landmark estimate in world coordinates
    /// * `compute_jacobian` - Also return the 2×3 projection Jacobian
    ///
    /// # Returns
    ///
    /// The residual and, when requested, the Jacobian. Behind the camera the Jacobian
    /// is zero and the residual is [`cheirality_penalty`](Self::cheirality_penalty).
    ///
    /// # Errors
    ///
    /// `Cheirality` if the landmark is behind the camera and `throw_cheirality` is set.
    pub fn evaluate_error(
        &self,
        point: &Vector3<f64>,
        compute_jacobian: bool,
    ) -> TriangulationResult<(Vector2<f64>, Option<Matrix2x3<f64>>)> {
        match self.camera.project(point, compute_jacobian) {
            Projection::Visible { pixel, jacobian } => Ok((pixel - self.measured, jacobian)),
            Projection::BehindCamera { depth } => {
                let jacobian = compute_jacobian.then(Matrix2x3::zeros);
                let residual = self.handle_cheirality(depth)?;
                Ok((residual, jacobian))
            }
        }
    }

    /// Raw residual `h(x) - z` at the landmark estimate in `values`.
    pub fn unwhitened_error(&self, values: &dyn ValueLookup) -> TriangulationResult<Vector2<f64>> {
        let point = values.point3(self.key())?;
        Ok(self.evaluate_error(&point, false)?.0)
    }

    /// Residual whitened by the noise model (raw residual if there is none).
    pub fn whitened_error(&self, values: &dyn ValueLookup) -> TriangulationResult<DVector<f64>> {
        let raw = self.unwhitened_error(values)?;
        let raw = DVector::from_column_slice(raw.as_slice());
        match &self.noise_model {
            Some(model) => model.whiten(&raw),
            None => Ok(raw),
        }
    }

    /// Linearize using a caller-owned workspace.
    ///
    /// Same as [`NonlinearFactor::linearize`] but leaves this instance's own buffers
    /// untouched, so one factor can be linearized from several threads, each with
    /// its own workspace.
    ///
    /// # Errors
    ///
    /// Lookup errors from `values` are returned unchanged; `Cheirality` as for
    /// [`evaluate_error`](Self::evaluate_error).
    pub fn linearize_with(
        &self,
        values: &dyn ValueLookup,
        workspace: &mut LinearizationWorkspace,
    ) -> TriangulationResult<Option<JacobianFactor>> {
        let point = values.point3(self.key())?;
        if !self.is_active(values) {
            return Ok(None);
        }

        let (a, b, ab) = workspace.buffers();

        // A δ ≈ h(x + δ) - z = h(x) + A δ - z  =>  b = z - h(x)
        match self.camera.project(&point, true) {
            Projection::Visible { pixel, jacobian } => {
                b.copy_from(&(self.measured - pixel));
                match jacobian {
                    Some(jac) => a.copy_from(&jac),
                    None => a.fill(0.0),
                }
            }
            Projection::BehindCamera { depth } => {
                let penalty = self.handle_cheirality(depth)?;
                a.fill(0.0);
                b.copy_from(&(-penalty));
            }
        }

        if let Some(model) = &self.noise_model {
            model.whiten_system(a, b)?;
        }

        ab.block_mut(0).copy_from(&*a);
        ab.block_mut(1).copy_from(&*b);

        JacobianFactor::new(self.keys.to_vec(), ab.clone()).map(Some)
    }
}

impl<C> NonlinearFactor for TriangulationFactor<C>
where
    C: Calibration,
{
    fn keys(&self) -> &[Key] {
        &self.keys
    }

    fn dim(&self) -> usize {
        MEASUREMENT_DIM
    }

    fn is_active(&self, values: &dyn ValueLookup) -> bool {
        self.activity
            .as_ref()
            .map_or(true, |predicate| predicate(values))
    }

    fn error(&self, values: &dyn ValueLookup) -> TriangulationResult<f64> {
        if !self.is_active(values) {
            return Ok(0.0);
        }
        Ok(0.5 * self.whitened_error(values)?.norm_squared())
    }

    fn linearize(
        &mut self,
        values: &dyn ValueLookup,
    ) -> TriangulationResult<Option<JacobianFactor>> {
        let mut workspace = std::mem::take(&mut self.workspace);
        let result = self.linearize_with(values, &mut workspace);
        self.workspace = workspace;
        result
    }

    fn equals(&self, other: &dyn NonlinearFactor, tol: f64) -> bool {
        let Some(other) = other.as_any().downcast_ref::<Self>() else {
            return false;
        };
        let noise_models_equal = match (&self.noise_model, &other.noise_model) {
            (None, None) => true,
            (Some(a), Some(b)) => a.equals(b, tol),
            _ => false,
        };
        noise_models_equal
            && self.keys == other.keys
            && self.camera.equals(&other.camera, tol)
            && (self.measured - other.measured).amax() <= tol
    }

    fn clone_box(&self) -> Box<dyn NonlinearFactor> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl<C> fmt::Display for TriangulationFactor<C>
where
    C: Calibration,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "TriangulationFactor, camera: {}, z: [{}, {}]",
            self.camera, self.measured.x, self.measured.y
        )?;
        match &self.noise_model {
            Some(model) => write!(f, ", noise model: {model}")?,
            None => write!(f, ", no noise model")?,
        }
        write!(f, ", keys: [{}]", self.key())
    }
}

impl<C> fmt::Debug for TriangulationFactor<C>
where
    C: Calibration,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TriangulationFactor")
            .field("camera", &self.camera)
            .field("measured", &self.measured)
            .field("noise_model", &self.noise_model)
            .field("keys", &self.keys)
            .field("throw_cheirality", &self.throw_cheirality)
            .field("verbose_cheirality", &self.verbose_cheirality)
            .field("has_activity", &self.activity.is_some())
            .field("workspace", &self.workspace)
            .finish()
    }
}

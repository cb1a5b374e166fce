use std::fs;
use std::path::Path;

use pntmatch_parser::{ProblemConfig, parse_points, parse_problem};

use crate::context::SearchContext;
use crate::error::SearchError;
use crate::eval;
use crate::matching::{Correspondence, FULL_EVAL};
use crate::pointset::PointSet;
use crate::transform::{ModelExtent, TransformKind, TransformModel};

/// A point set in the coordinate frame the search runs in. Transform
/// classes that solve on normalized coordinates keep the original set
/// alongside so results can be reported in image coordinates.
#[derive(Debug, Clone)]
enum Frame {
    Shared(PointSet),
    Normalized { search: PointSet, original: PointSet },
}

impl Frame {
    fn search(&self) -> &PointSet {
        match self {
            Frame::Shared(set) => set,
            Frame::Normalized { search, .. } => search,
        }
    }

    fn original(&self) -> &PointSet {
        match self {
            Frame::Shared(set) => set,
            Frame::Normalized { original, .. } => original,
        }
    }
}

/// Everything one matching run needs: both point sets (search frame and
/// original), the transform class, and the tuning parameters from the
/// problem file.
pub struct Problem {
    pub name: String,
    pub kind: TransformKind,
    model: Frame,
    data: Frame,
    /// Squared and normalization-scaled; fitting divides by this.
    pub sigma: f64,
    /// Sigma exactly as the problem file gave it.
    pub un_sigma: f64,
    pub scale: f64,
    pub spurious: bool,
    pub instances: usize,
    pub solution: Option<Correspondence>,
    pub extent: ModelExtent,
}

impl Problem {
    /// Load a problem description and the point sets it names. Point paths
    /// are resolved relative to the problem file's directory.
    pub fn load(path: &Path) -> Result<Problem, SearchError> {
        let text = read(path)?;
        let cfg = parse_problem(&text)?;
        let dir = path.parent().unwrap_or(Path::new(""));
        let model = load_points(&dir.join(&cfg.model))?;
        let data = load_points(&dir.join(&cfg.data))?;
        Problem::from_config(cfg, model, data)
    }

    pub fn from_config(
        cfg: ProblemConfig,
        model: PointSet,
        data: PointSet,
    ) -> Result<Problem, SearchError> {
        let kind = TransformKind::from_request(cfg.transform)
            .ok_or(SearchError::UnsupportedTransform(cfg.transform))?;
        let transform = kind.model();

        let name = cfg
            .name
            .unwrap_or_else(|| format!("{}_to_{}", model.label(), data.label()));

        let un_sigma = cfg.sigma;
        let mut sigma = cfg.sigma;
        let model_len = model.len();

        let (model, data, side_factor) = if transform.normalizes() {
            let original_model = model.clone();
            let original_data = data.clone();
            let mut model = model;
            let mut data = data;
            let data_scale = data.normalize();
            sigma *= data_scale;
            let ratio = model.normalize() / data_scale;
            // A normalized model side of length l lands in data space with
            // expected length (ms/ds)·l; storing the reciprocal lets the
            // degeneracy test multiply instead of divide.
            let side = model.bounds().side();
            let side_factor = [ratio / side[0], ratio / side[1]];
            (
                Frame::Normalized {
                    search: model,
                    original: original_model,
                },
                Frame::Normalized {
                    search: data,
                    original: original_data,
                },
                side_factor,
            )
        } else {
            let side = model.bounds().side();
            let side_factor = [1.0 / side[0], 1.0 / side[1]];
            (Frame::Shared(model), Frame::Shared(data), side_factor)
        };

        let extent = ModelExtent {
            bounds: model.search().bounds(),
            side_factor,
            size: model_len,
        };

        let mut problem = Problem {
            name,
            kind,
            model,
            data,
            sigma: sigma * sigma,
            un_sigma,
            scale: cfg.scale,
            spurious: cfg.spurious,
            instances: cfg.instances.max(1),
            solution: None,
            extent,
        };

        // score the known-good solution up front so reports can cite it
        if let Some(pairs) = cfg.solution {
            let mut solution = Correspondence::from_indices(pairs);
            let mut ctx = SearchContext::new(&problem);
            eval::evaluate_compact(&problem, &mut solution, &mut ctx, FULL_EVAL);
            problem.solution = Some(solution);
        }

        Ok(problem)
    }

    /// Model points in the search frame.
    pub fn model(&self) -> &PointSet {
        self.model.search()
    }

    /// Data points in the search frame.
    pub fn data(&self) -> &PointSet {
        self.data.search()
    }

    /// Model points in original image coordinates.
    pub fn un_model(&self) -> &PointSet {
        self.model.original()
    }

    /// Data points in original image coordinates.
    pub fn un_data(&self) -> &PointSet {
        self.data.original()
    }

    pub fn transform(&self) -> &'static dyn TransformModel {
        self.kind.model()
    }

    pub fn min_pairs(&self) -> usize {
        self.transform().min_pairs()
    }
}

fn read(path: &Path) -> Result<String, SearchError> {
    fs::read_to_string(path).map_err(|source| SearchError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn load_points(path: &Path) -> Result<PointSet, SearchError> {
    let text = read(path)?;
    let mut set = PointSet::from_file(parse_points(&text)?);
    if set.name.is_none() {
        set.name = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned());
    }
    Ok(set)
}

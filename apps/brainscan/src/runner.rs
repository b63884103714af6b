//! 各子命令的实际运行.

use crate::{ClassifyArgs, PatientArgs, SegmentArgs};
use anyhow::{anyhow, bail, Context};
use mri_berry::classify::{ClassificationResult, Classifier, Severity};
use mri_berry::inference::ModelCache;
use mri_berry::measure::SliceMeasurement;
use mri_berry::patient::{self, PatientForm, PatientStore};
use mri_berry::preprocess::SliceWindow;
use mri_berry::report;
use mri_berry::segment::{SegmentationResult, Segmenter};
use mri_berry::session::{Session, StoredSegmentation};
use mri_berry::MriVolume;
use std::fs;
use std::path::{Path, PathBuf};
use utils::config;

/// 解析后的目录配置. 命令行参数优先于环境变量.
pub struct Paths {
    model_dir: Option<PathBuf>,
    data_dir: PathBuf,
}

impl Paths {
    pub fn resolve(model_dir: Option<PathBuf>, data_dir: Option<PathBuf>) -> Self {
        Self {
            model_dir,
            data_dir: data_dir.unwrap_or_else(config::data_dir),
        }
    }

    fn seg_model(&self, explicit: Option<PathBuf>) -> PathBuf {
        explicit
            .or_else(|| self.model_dir.as_deref().map(config::seg_model_path_in))
            .unwrap_or_else(config::seg_model_path)
    }

    fn cls_model(&self, explicit: Option<PathBuf>) -> PathBuf {
        explicit
            .or_else(|| self.model_dir.as_deref().map(config::cls_model_path_in))
            .unwrap_or_else(config::cls_model_path)
    }

    fn session(&self) -> PathBuf {
        self.data_dir.join(config::SESSION_FILE)
    }
}

/// 会话文件只是缓存, 写入失败不影响本次结果.
fn save_session(session: &Session, path: &Path) {
    if let Err(e) = session.save(path) {
        log::warn!("unable to save session {}: {e}", path.display());
    }
}

fn absolute(p: &Path) -> PathBuf {
    fs::canonicalize(p).unwrap_or_else(|_| p.to_owned())
}

pub fn patient_add(paths: &Paths, a: PatientArgs) -> anyhow::Result<()> {
    let form = PatientForm {
        name: a.nom,
        surname: a.prenom,
        email: a.email,
        age: a.age,
        phone: a.telephone,
        address: a.adresse,
        notes: a.commentaires,
    };
    let record = form.into_record(patient::today()).map_err(|e| anyhow!("⚠️ {e}"))?;
    let store = PatientStore::new(&paths.data_dir);
    let path = store.save(&record)?;
    println!(
        "✅ Informations enregistrées pour {} {} ({})",
        record.surname,
        record.name,
        path.display()
    );
    Ok(())
}

pub fn patient_list(paths: &Paths) -> anyhow::Result<()> {
    let records = PatientStore::new(&paths.data_dir).list()?;
    if records.is_empty() {
        println!("Aucun patient enregistré.");
        return Ok(());
    }
    for r in records {
        println!(
            "{}  {} {}, {} ans, {}, {}",
            r.date, r.surname, r.name, r.age, r.email, r.phone
        );
    }
    Ok(())
}

fn print_classification(r: &ClassificationResult) {
    let icon = match r.severity() {
        Severity::Clear => "✅",
        Severity::Warning => "⚠️",
        Severity::Alert => "🚨",
    };
    utils::sep();
    println!("{icon} {}", r.headline());
    println!("Confiance de la prédiction: {:.1}%", r.confidence_percent());
    utils::sep();
    for (class, p) in r.percentages() {
        let marker = if class == r.class { "*" } else { " " };
        println!("{marker} {:<18} {p:>5.1}%", class.display_name());
    }
}

pub fn classify(paths: &Paths, a: ClassifyArgs) -> anyhow::Result<()> {
    let img = image::open(&a.image)
        .with_context(|| format!("Impossible de lire l'image {}", a.image.display()))?;

    let cache = ModelCache::onnx(paths.cls_model(a.model));
    let model = cache
        .get()
        .map_err(|e| anyhow!("Impossible de charger le modèle: {e}"))?;
    let result = Classifier::new(model)
        .with_size(a.size)
        .with_normalization(a.norm.into())
        .run(&img)
        .map_err(|e| anyhow!("Erreur lors de la prédiction: {e}"))?;

    println!("✅ Analyse terminée!");
    print_classification(&result);

    if let Some(p) = &a.report {
        fs::write(p, report::classification_report(&result))
            .with_context(|| format!("writing {}", p.display()))?;
        println!("📄 Rapport: {}", p.display());
    }
    if let Some(p) = &a.annotate {
        report::annotate_classification(&img, &result)
            .save(p)
            .with_context(|| format!("writing {}", p.display()))?;
        println!("🖼️ Image annotée: {}", p.display());
    }

    let session_path = paths.session();
    let mut session = Session::load_or_default(&session_path).unwrap_or_else(|e| {
        log::warn!("discarding session: {e}");
        Session::default()
    });
    session.set_classification(result, &absolute(&a.image));
    save_session(&session, &session_path);
    Ok(())
}

fn print_measurement(index: usize, source: usize, m: &SliceMeasurement) {
    utils::sep();
    println!("Coupe {index} (coupe d'origine {source})");
    println!("Surface (mm²)   {:.2}", m.surface_mm2);
    println!("Périmètre (mm)  {:.2}", m.perimeter_mm);
    println!("Densité         {:.4}", m.density);
    utils::sep();
}

fn measure_and_print(result: &SegmentationResult, index: usize) -> anyhow::Result<()> {
    let m = result.measure(index)?;
    let source = result.window.start + index;
    print_measurement(index, source, &m);
    Ok(())
}

fn render_to(
    flair: &MriVolume,
    t1ce: &MriVolume,
    result: &SegmentationResult,
    index: usize,
    out: &Path,
) -> anyhow::Result<()> {
    let Some(mask) = result.mask.get(index) else {
        bail!("slice {index} out of range, the mask has {} slices", result.mask.len());
    };
    let z = result.window.start + index;
    let (Some(f), Some(t)) = (flair.get_slice(z), t1ce.get_slice(z)) else {
        bail!("source slice {z} is missing from the volumes");
    };
    report::render_slice_panel(f, t, mask)
        .save(out)
        .with_context(|| format!("writing {}", out.display()))?;
    println!("🖼️ Rendu: {}", out.display());
    Ok(())
}

fn open_volume(p: &Path) -> anyhow::Result<MriVolume> {
    MriVolume::open(p).with_context(|| format!("Impossible de lire le volume {}", p.display()))
}

/// 推理前先检查要测量的切片是否在窗口内.
fn check_slice(window: &SliceWindow, slice: usize) -> anyhow::Result<()> {
    if slice >= window.count {
        bail!(
            "slice {slice} out of range, the window has {} slices",
            window.count
        );
    }
    Ok(())
}

pub fn segment(paths: &Paths, a: SegmentArgs) -> anyhow::Result<()> {
    let window = SliceWindow::new(a.start, a.count, a.size).ok_or_else(|| {
        anyhow!("the slice window needs a non-zero count and size, and must end before usize::MAX")
    })?;
    check_slice(&window, a.slice)?;
    let flair = open_volume(&a.flair)?;
    let t1ce = open_volume(&a.t1ce)?;

    let cache = ModelCache::onnx(paths.seg_model(a.model));
    let model = cache
        .get()
        .map_err(|e| anyhow!("Impossible de charger le modèle: {e}"))?;
    let result = Segmenter::new(model)
        .with_window(window)
        .rescale_spacing(a.rescale_spacing)
        .run(&flair, &t1ce)
        .map_err(|e| anyhow!("Erreur lors de la prédiction: {e}"))?;
    println!("✅ Segmentation terminée");

    let session_path = paths.session();
    let mut session = Session::load_or_default(&session_path).unwrap_or_else(|e| {
        log::warn!("discarding session: {e}");
        Session::default()
    });
    session.set_segmentation(&result, &absolute(&a.flair), &absolute(&a.t1ce))?;
    save_session(&session, &session_path);

    measure_and_print(&result, a.slice)?;

    if let Some(p) = &a.npy {
        result
            .mask
            .save_npy(p)
            .with_context(|| format!("writing {}", p.display()))?;
        println!("💾 Masque: {}", p.display());
    }
    if let Some(p) = &a.render {
        render_to(&flair, &t1ce, &result, a.slice, p)?;
    }
    if let Some(p) = &a.report {
        fs::write(p, report::segmentation_report(&result, a.slice)?)
            .with_context(|| format!("writing {}", p.display()))?;
        println!("📄 Rapport: {}", p.display());
    }
    Ok(())
}

fn last_segmentation(paths: &Paths) -> anyhow::Result<(StoredSegmentation, SegmentationResult)> {
    let path = paths.session();
    let session = Session::load(&path).with_context(|| {
        format!(
            "no previous segmentation, run `brainscan segment` first ({})",
            path.display()
        )
    })?;
    let Some(stored) = session.segmentation() else {
        bail!("no previous segmentation, run `brainscan segment` first");
    };
    let result = stored.restore()?;
    Ok((stored.clone(), result))
}

pub fn measure(paths: &Paths, index: usize) -> anyhow::Result<()> {
    let (_, result) = last_segmentation(paths)?;
    measure_and_print(&result, index)
}

pub fn render(paths: &Paths, index: usize, out: &Path) -> anyhow::Result<()> {
    let (stored, result) = last_segmentation(paths)?;
    let flair = open_volume(&stored.flair)?;
    let t1ce = open_volume(&stored.t1ce)?;
    render_to(&flair, &t1ce, &result, index, out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mri_berry::consts::SEG_MODEL_FILE;

    #[test]
    fn test_explicit_paths_win() {
        let p = Paths::resolve(Some("/m".into()), Some("/d".into()));
        assert_eq!(p.seg_model(None), PathBuf::from("/m").join(SEG_MODEL_FILE));
        assert_eq!(p.cls_model(Some("/x.rten".into())), PathBuf::from("/x.rten"));
        assert_eq!(p.session(), PathBuf::from("/d/session.bin"));
    }

    #[test]
    fn test_slice_checked_before_inference() {
        let dir = tempfile::tempdir().unwrap();
        let p = Paths::resolve(Some(dir.path().join("models")), Some(dir.path().to_owned()));
        let w = SliceWindow::new(0, 4, 8).unwrap();
        assert!(check_slice(&w, 3).is_ok());
        assert!(check_slice(&w, 4).is_err());

        let args = SegmentArgs {
            flair: dir.path().join("flair.nii"),
            t1ce: dir.path().join("t1ce.nii"),
            model: None,
            start: 0,
            count: 4,
            size: 8,
            slice: 4,
            npy: Some(dir.path().join("mask.npy")),
            render: None,
            report: None,
            rescale_spacing: false,
        };
        let err = segment(&p, args).unwrap_err();
        assert!(err.to_string().contains("slice 4 out of range"));
        assert!(!p.session().exists());
    }

    #[test]
    fn test_measure_without_session() {
        let dir = tempfile::tempdir().unwrap();
        let p = Paths::resolve(None, Some(dir.path().to_owned()));
        assert!(measure(&p, 0).is_err());
    }
}

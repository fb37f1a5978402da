use std::collections::BTreeMap;

use super::{DoseBasis, DoseGrid, DoseSpec, DrugPkPd, Recommendation, SubtypeParams};
use crate::regimen::{Phase, Regimen, RegimenEntry};
use crate::simulator::schedule::Interval::{self, *};
use crate::simulator::schedule::Schedule;

#[allow(clippy::too_many_arguments)]
fn drug(
    dose: DoseSpec,
    interval: Interval,
    cl: f64,
    q: f64,
    v1: f64,
    v2: f64,
    e_max: f64,
    ec50: f64,
) -> DrugPkPd {
    DrugPkPd {
        cl,
        q,
        v1,
        v2,
        dose: Some(dose),
        schedule: Schedule::Periodic(interval),
        e_max,
        ec50,
    }
}

pub(super) fn drugs() -> BTreeMap<String, DrugPkPd> {
    use DoseSpec::{Fixed, PerBsa};
    [
        ("docetaxel", drug(PerBsa(75.0), Q3w, 15.0, 10.0, 15.0, 40.0, 0.35, 0.5)),
        ("cyclophosphamide", drug(PerBsa(600.0), Q3w, 10.0, 6.0, 20.0, 55.0, 0.28, 0.6)),
        ("doxorubicin", drug(PerBsa(60.0), Q3w, 12.0, 8.0, 20.0, 50.0, 0.40, 0.4)),
        ("paclitaxel", drug(PerBsa(80.0), Weekly, 20.0, 10.0, 15.0, 35.0, 0.30, 0.7)),
        ("trastuzumab_sc", drug(Fixed(600.0), Q3w, 0.5, 0.3, 3.0, 4.0, 0.15, 0.2)),
        ("letrozole", drug(Fixed(2.5), Daily, 0.25, 0.0, 100.0, 0.0, 0.12, 0.05)),
        ("tamoxifen", drug(Fixed(20.0), Daily, 0.2, 0.0, 120.0, 0.0, 0.10, 0.03)),
        ("anastrozole", drug(Fixed(1.0), Daily, 0.15, 0.0, 80.0, 0.0, 0.12, 0.04)),
        ("zoledronic_acid", drug(Fixed(4.0), Q6m, 5.0, 2.0, 6.0, 12.0, 0.05, 0.3)),
        ("carboplatin", drug(PerBsa(600.0), Q3w, 10.0, 5.0, 20.0, 40.0, 0.25, 0.5)),
        // No dose grids for these, they are only used through regimens
        ("toremifene", drug(Fixed(60.0), Daily, 0.2, 0.0, 120.0, 0.0, 0.10, 0.03)),
        ("fulvestrant", drug(Fixed(500.0), Q4w, 0.3, 0.0, 50.0, 0.0, 0.15, 0.05)),
        ("buserelin", drug(Fixed(3.75), Q4w, 0.3, 0.0, 50.0, 0.0, 0.10, 0.05)),
        ("pertuzumab", drug(Fixed(420.0), Q3w, 0.5, 0.3, 3.0, 4.0, 0.15, 0.2)),
        ("trastuzumab_emtansine", drug(PerBsa(3.6), Q3w, 0.5, 0.3, 3.0, 4.0, 0.20, 0.2)),
        ("capecitabine", drug(PerBsa(2000.0), Q3w, 15.0, 10.0, 30.0, 70.0, 0.25, 0.5)),
        ("olaparib", drug(Fixed(600.0), Daily, 10.0, 5.0, 50.0, 0.0, 0.20, 0.3)),
    ]
    .into_iter()
    .map(|(name, d)| (name.to_string(), d))
    .collect()
}

pub(super) fn grids() -> BTreeMap<String, DoseGrid> {
    use DoseBasis::{Fixed, PerBsa};
    [
        ("doxorubicin", DoseGrid::stepped(PerBsa, 50.0, 70.0, 10.0, vec![Q3w, Q2w])),
        ("cyclophosphamide", DoseGrid::stepped(PerBsa, 500.0, 700.0, 50.0, vec![Q3w, Q2w])),
        ("docetaxel", DoseGrid::stepped(PerBsa, 60.0, 100.0, 10.0, vec![Q3w])),
        (
            "paclitaxel",
            DoseGrid::new(PerBsa, vec![60.0, 80.0, 100.0, 150.0, 175.0], vec![Weekly, Q2w]),
        ),
        ("trastuzumab_sc", DoseGrid::new(Fixed, vec![600.0], vec![Q3w])),
        ("letrozole", DoseGrid::new(Fixed, vec![2.5], vec![Daily])),
        ("tamoxifen", DoseGrid::new(Fixed, vec![20.0], vec![Daily])),
        ("anastrozole", DoseGrid::new(Fixed, vec![1.0], vec![Daily])),
        ("zoledronic_acid", DoseGrid::new(Fixed, vec![4.0], vec![Q6m])),
        ("carboplatin", DoseGrid::stepped(PerBsa, 300.0, 600.0, 50.0, vec![Q3w])),
    ]
    .into_iter()
    .map(|(name, g)| (name.to_string(), g))
    .collect()
}

fn single(description: &str, drugs: &[&str]) -> RegimenEntry {
    RegimenEntry {
        description: description.to_string(),
        regimen: Regimen::Single {
            drugs: drugs.iter().map(|d| d.to_string()).collect(),
        },
    }
}

fn phased(description: &str, phases: Vec<(f64, Vec<&str>)>) -> RegimenEntry {
    RegimenEntry {
        description: description.to_string(),
        regimen: Regimen::Phased {
            phases: phases
                .into_iter()
                .map(|(duration, drugs)| Phase {
                    duration,
                    drugs: drugs.iter().map(|d| d.to_string()).collect(),
                })
                .collect(),
        },
    }
}

pub(super) fn regimens() -> BTreeMap<String, RegimenEntry> {
    [
        ("TC", single("Docetaxel + Cyclophosphamide", &["docetaxel", "cyclophosphamide"])),
        ("AC", single("Doxorubicin + Cyclophosphamide", &["doxorubicin", "cyclophosphamide"])),
        (
            "AC_T",
            phased(
                "Doxorubicin + Cyclophosphamide followed by Paclitaxel",
                vec![
                    (84.0, vec!["doxorubicin", "cyclophosphamide"]),
                    (84.0, vec!["paclitaxel"]),
                ],
            ),
        ),
        ("T_paclitaxel", single("Trastuzumab + Paclitaxel", &["trastuzumab_sc", "paclitaxel"])),
        ("T_mono", single("Trastuzumab monotherapy", &["trastuzumab_sc"])),
        ("LET", single("Letrozole monotherapy", &["letrozole"])),
        ("TAM", single("Tamoxifen monotherapy", &["tamoxifen"])),
        ("ANA", single("Anastrozole monotherapy", &["anastrozole"])),
        ("BONE", single("Zoledronic acid", &["zoledronic_acid"])),
        ("PLATINUM", single("Carboplatin", &["carboplatin"])),
        ("FUL", single("Fulvestrant monotherapy", &["fulvestrant"])),
        ("TOR", single("Toremifene monotherapy", &["toremifene"])),
        (
            "TAM_AI",
            phased(
                "Tamoxifen followed by an aromatase inhibitor",
                vec![(3.0 * 365.0, vec!["tamoxifen"]), (2.0 * 365.0, vec!["letrozole"])],
            ),
        ),
        (
            "TCH",
            phased(
                "Docetaxel + Carboplatin + Trastuzumab x 6",
                vec![(6.0 * 21.0, vec!["docetaxel", "carboplatin", "trastuzumab_sc"])],
            ),
        ),
    ]
    .into_iter()
    .map(|(name, r)| (name.to_string(), r))
    .collect()
}

fn rec(name: &str, comment: &str) -> Recommendation {
    Recommendation {
        name: name.to_string(),
        comment: comment.to_string(),
    }
}

pub(super) fn recommended() -> BTreeMap<String, Vec<Recommendation>> {
    let mut table = BTreeMap::new();
    table.insert(
        "HR+".to_string(),
        vec![
            rec("LET", "Endocrine therapy, tamoxifen or aromatase inhibitor"),
            rec("TC", "Docetaxel + cyclophosphamide, 4-6 cycles"),
            rec("AC", "AC/EC, 4 cycles"),
            rec("AC_T", "AC/EC then docetaxel x4 or weekly paclitaxel x12"),
        ],
    );
    table.insert(
        "HER2+".to_string(),
        vec![
            rec("T_paclitaxel", "Taxane + trastuzumab given together"),
            rec("T_mono", "Maintenance trastuzumab"),
            rec("AC_T", "AC then taxane then anti-HER2"),
        ],
    );
    table.insert(
        "TNBC".to_string(),
        vec![
            rec("AC", "Anthracyclines (AC/EC)"),
            rec("TC", "Docetaxel + cyclophosphamide"),
            rec("AC_T", "AC then weekly paclitaxel or docetaxel"),
            rec("PLATINUM", "Platinum, e.g. carboplatin"),
        ],
    );
    table
}

pub(super) fn subtypes() -> BTreeMap<String, SubtypeParams> {
    let params = |d, k_clear, k, f_n0, t_cycle| SubtypeParams {
        d,
        k_clear,
        k,
        f_n0,
        t_cycle,
    };
    [
        ("HR+", params(0.01, 0.001, 800.0, 0.2, 3.0)),
        ("HER2+", params(0.012, 0.001, 700.0, 0.25, 2.0)),
        ("TNBC", params(0.015, 0.0015, 600.0, 0.3, 1.0)),
    ]
    .into_iter()
    .map(|(name, p)| (name.to_string(), p))
    .collect()
}

pub(super) fn toxicity_limits() -> BTreeMap<String, f64> {
    [("doxorubicin", 500.0), ("epirubicin", 900.0), ("carboplatin", 800.0)]
        .into_iter()
        .map(|(name, limit)| (name.to_string(), limit))
        .collect()
}

pub(super) fn max_cycles() -> BTreeMap<String, usize> {
    [
        ("doxorubicin", 6),
        ("cyclophosphamide", 6),
        ("docetaxel", 6),
        ("paclitaxel", 12),
        ("carboplatin", 6),
    ]
    .into_iter()
    .map(|(name, cycles)| (name.to_string(), cycles))
    .collect()
}

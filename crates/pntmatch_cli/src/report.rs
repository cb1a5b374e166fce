use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use chrono::Local;

use pntmatch_search::eval::proper_pose;
use pntmatch_search::{Correspondence, Problem, RunOutcome, same_instance};

/// Walk the ranked list the way the original reporter did: skip entries
/// that describe the same scene instance as the previously emitted result,
/// stop once `instances` results are out.
fn ranked_instances<'a>(problem: &Problem, matches: &'a [Correspondence]) -> Vec<&'a Correspondence> {
    let mut emitted: Vec<&Correspondence> = Vec::new();
    for m in matches {
        if emitted.len() >= problem.instances {
            break;
        }
        if emitted.last().is_some_and(|prev| same_instance(prev, m)) {
            continue;
        }
        emitted.push(m);
    }
    emitted
}

fn pose_rows(pose: &[f64; 8]) -> [[f64; 3]; 3] {
    [
        [pose[0], pose[1], pose[2]],
        [pose[3], pose[4], pose[5]],
        [pose[6], pose[7], 1.0],
    ]
}

pub fn print_report(problem: &Problem, outcome: &RunOutcome) {
    println!();
    print_problem(problem);

    if let Some(solution) = &problem.solution {
        println!("***** Previously known good solution *****");
        print_match(solution);
        print_pose(problem, solution);
        println!();
    }

    for (k, m) in ranked_instances(problem, &outcome.matches).iter().enumerate() {
        println!("***** Result {} found on trial {} *****", k + 1, m.trial + 1);
        print_match(m);
        print_pose(problem, m);
        println!();
    }
}

fn print_problem(problem: &Problem) {
    let model = problem.un_model();
    let data = problem.un_data();
    println!("Matching {} to {}\n", model.label(), data.label());
    println!("{} has {} points", model.label(), model.len());
    println!("{} has {} points", data.label(), data.len());
    println!("Transformation class is {}", problem.kind.name());
    println!(
        "Sigma : {:5.2}\tAllowed Scaling {:5.2}",
        problem.un_sigma, problem.scale
    );
    println!(
        "{}\n",
        if problem.spurious {
            "Spurious points exist"
        } else {
            "No spurious points"
        }
    );
}

fn print_match(m: &Correspondence) {
    for (i, pair) in m.pairs.iter().enumerate() {
        print!("({:3},{:3}) ", pair.model, pair.data);
        if (i + 1) % 8 == 0 {
            println!();
        }
    }
    println!("\nPairs: {} Fitness: {:8.4}", m.len(), m.error);
}

fn print_pose(problem: &Problem, m: &Correspondence) {
    let Ok(pose) = proper_pose(problem, m) else {
        log::warn!("pose could not be recovered for reporting");
        return;
    };
    println!("Optimal Pose:");
    for row in pose_rows(&pose) {
        println!("{:7.5} {:7.5} {:7.5}", row[0], row[1], row[2]);
    }
}

fn sanitize_filename(input: &str) -> String {
    let mut out = String::new();
    for c in input.chars() {
        match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '_' | '-' | '.' => out.push(c),
            ' ' => out.push('_'),
            _ => {}
        }
    }
    if out.is_empty() {
        "pntmatch".to_string()
    } else {
        out
    }
}

/// Write `results_<name>/index.html` with the problem summary, the known
/// solution when one was given, and the ranked results. Returns the
/// directory written.
pub fn write_html_report(problem: &Problem, outcome: &RunOutcome) -> std::io::Result<PathBuf> {
    let dir = PathBuf::from(format!("results_{}", sanitize_filename(&problem.name)));
    fs::create_dir_all(&dir)?;
    let mut out = BufWriter::new(File::create(dir.join("index.html"))?);

    let model = problem.un_model();
    let data = problem.un_data();
    writeln!(out, "<html>\n<head><title>{} matched to {}</title></head>", model.label(), data.label())?;
    writeln!(out, "<body>")?;
    writeln!(
        out,
        "<p><center><strong>{} matched to {}</strong></center><br>",
        model.label(),
        data.label()
    )?;
    writeln!(out, "{} has {} points<br>", model.label(), model.len())?;
    writeln!(out, "{} has {} points<br>", data.label(), data.len())?;
    writeln!(out, "Transformation class is {}<br>", problem.kind.name())?;
    writeln!(
        out,
        "Sigma : {:5.2}<br>Allowed Scaling {:5.2}<br>",
        problem.un_sigma, problem.scale
    )?;
    writeln!(
        out,
        "{}</p>",
        if problem.spurious {
            "Spurious points exist"
        } else {
            "No spurious points"
        }
    )?;
    writeln!(
        out,
        "<p>{} trials searched, report generated {}</p>",
        outcome.trials,
        Local::now().format("%Y-%m-%d %H:%M:%S")
    )?;
    writeln!(out, "<hr>")?;

    if let Some(solution) = &problem.solution {
        writeln!(
            out,
            "<p><center><strong>Previously known good solution</strong></center></p>"
        )?;
        write_match_html(&mut out, problem, solution)?;
    }

    for (k, m) in ranked_instances(problem, &outcome.matches).iter().enumerate() {
        writeln!(out, "<hr>")?;
        writeln!(
            out,
            "<p><center><strong>Result {} found on trial {}</strong></center></p>",
            k + 1,
            m.trial + 1
        )?;
        write_match_html(&mut out, problem, m)?;
    }

    writeln!(out, "</body>\n</html>")?;
    out.flush()?;
    Ok(dir)
}

fn write_match_html(
    out: &mut impl Write,
    problem: &Problem,
    m: &Correspondence,
) -> std::io::Result<()> {
    if let Ok(pose) = proper_pose(problem, m) {
        writeln!(out, "<strong>Optimal Pose</strong><br>")?;
        writeln!(out, "<table border=\"1\">")?;
        for row in pose_rows(&pose) {
            writeln!(
                out,
                "<tr><td>{:7.5}</td><td>{:7.5}</td><td>{:7.5}</td></tr>",
                row[0], row[1], row[2]
            )?;
        }
        writeln!(out, "</table>")?;
    }

    writeln!(out, "<p><table>")?;
    for chunk in m.pairs.chunks(8) {
        write!(out, "<tr>")?;
        for pair in chunk {
            write!(out, "<td>({:3},{:3})</td>", pair.model, pair.data)?;
        }
        writeln!(out, "</tr>")?;
    }
    writeln!(out, "</table><br>")?;
    writeln!(out, "Pairs: {} Fitness: {:8.4}</p>", m.len(), m.error)?;
    Ok(())
}

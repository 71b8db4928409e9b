use crate::model::{BuildModel, Entrypoint, Instruction};

/// Renders a [`BuildModel`] as a Dockerfile.
///
/// Standard builds produce a single runtime stage. Native builds add a
/// builder stage that compiles the executable, and the runtime stage copies
/// only the resulting binary out of it.
pub struct DockerfileGenerator<'a> {
    build: &'a BuildModel,
}

impl<'a> DockerfileGenerator<'a> {
    pub fn new(build: &'a BuildModel) -> Self {
        Self { build }
    }

    pub fn render(&self) -> String {
        let mut out = String::new();

        match &self.build.builder {
            Some(builder) => {
                out.push_str("# === Stage 1: Builder ===\n");
                out.push_str(&format!("FROM {} AS builder\n", builder.image));
                render_instructions(&mut out, &builder.instructions);
                out.push_str("\n# === Stage 2: Runtime ===\n");
            }
            None => out.push_str("# === Runtime ===\n"),
        }

        out.push_str(&format!("FROM {}\n", self.build.base_image));
        render_instructions(&mut out, &self.build.instructions);

        if !self.build.exposed_ports.is_empty() {
            let ports = self
                .build
                .exposed_ports
                .iter()
                .map(u16::to_string)
                .collect::<Vec<_>>()
                .join(" ");
            out.push_str(&format!("EXPOSE {ports}\n"));
        }

        let cmd = match &self.build.entrypoint {
            Entrypoint::Shell(cmd) => format!("CMD {cmd}\n"),
            Entrypoint::Exec(args) => {
                let quoted = args
                    .iter()
                    .map(|a| format!("\"{}\"", quote(a)))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("CMD [{quoted}]\n")
            }
        };
        out.push_str(&cmd);
        out
    }
}

fn render_instructions(out: &mut String, instructions: &[Instruction]) {
    for instruction in instructions {
        let line = match instruction {
            Instruction::Workdir(dir) => format!("WORKDIR {dir}"),
            Instruction::Copy {
                source,
                target,
                from_stage: Some(stage),
            } => format!("COPY --from={stage} {source} {target}"),
            Instruction::Copy {
                source,
                target,
                from_stage: None,
            } => format!("COPY {source} {target}"),
            Instruction::Env { name, value } => format!("ENV {name}=\"{}\"", quote(value)),
            Instruction::Run(command) => format!("RUN {command}"),
        };
        out.push_str(&line);
        out.push('\n');
    }
}

/// Escape for a double-quoted Dockerfile string.
fn quote(raw: &str) -> String {
    raw.replace('\\', "\\\\").replace('"', "\\\"")
}

pub mod pdftoppm_rasterizer;
